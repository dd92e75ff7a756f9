//! Base types for structure of BSA file.

use binrw::{BinRead, BinWrite};

use crate::error::FormatError;

/// Size of the fixed header, which is also where the folder records start
pub const HEADER_SIZE: u32 = 36;

/// Folder names are stored in the directory
pub const FLAG_FOLDER_NAMES: u32 = 0x1;

/// File names are stored in the file name table
pub const FLAG_FILE_NAMES: u32 = 0x2;

/// Files are compressed unless their record says otherwise
pub const FLAG_COMPRESSED: u32 = 0x4;

/// Every payload starts with the entry's name (only honoured by version 0x68)
pub const FLAG_EMBED_FILE_NAMES: u32 = 0x100;

/// Bit in [`FileRecord::size`] inverting the archive's default compression for that file
pub const SIZE_COMPRESSION_TOGGLE: u32 = 1 << 30;

/// Sizes must stay below the compression toggle bit
pub const MAX_FILE_SIZE: u64 = SIZE_COMPRESSION_TOGGLE as u64;

/// Informational flags recording which kinds of files an archive holds
const FILE_TYPE_FLAGS: [(&str, u32); 13] = [
    (".nif", 0x1),
    (".dds", 0x2),
    (".xml", 0x4),
    (".wav", 0x8),
    (".mp3", 0x10),
    (".txt", 0x20),
    (".html", 0x20),
    (".bat", 0x20),
    (".scc", 0x20),
    (".spt", 0x40),
    (".tex", 0x80),
    (".fnt", 0x80),
    (".ctl", 0x100),
];

/// Look up the file type flag for a normalized extension (including its dot)
pub fn file_type_flag(extension: &str) -> u32 {
    FILE_TYPE_FLAGS
        .iter()
        .find(|(known, _)| *known == extension)
        .map_or(0, |(_, flag)| *flag)
}

/// Versions of the format that can be read and written
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Version {
    /// The Elder Scrolls IV: Oblivion
    #[default]
    Oblivion = 0x67,

    /// Fallout 3, which adds embedded file names
    Fallout3 = 0x68,
}

impl TryFrom<u32> for Version {
    type Error = FormatError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x67 => Ok(Version::Oblivion),
            0x68 => Ok(Version::Fallout3),
            v => Err(FormatError::UnsupportedVersion(v)),
        }
    }
}

/// BSA file header
///
/// Always starts with "BSA\0" followed by the version. All data is stored in little endian format
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"BSA\0", little)]
pub struct BsaHeader {
    /// Format version, see [`Version`]
    pub version: u32,

    /// Offset of the first folder record, always [`HEADER_SIZE`]
    pub folder_records_offset: u32,

    /// Archive wide flags
    pub archive_flags: u32,

    /// Number of folder records
    pub folder_count: u32,

    /// Number of file records across all folders
    pub file_count: u32,

    /// Length of all folder names, each including its terminator but not its length prefix
    pub total_folder_name_length: u32,

    /// Length of the file name table
    pub total_file_name_length: u32,

    /// Which kinds of files are stored, see [`file_type_flag`]
    pub file_flags: u32,
}

impl Default for BsaHeader {
    fn default() -> Self {
        Self {
            version: Version::default() as u32,
            folder_records_offset: HEADER_SIZE,
            archive_flags: FLAG_FOLDER_NAMES | FLAG_FILE_NAMES,
            folder_count: 0,
            file_count: 0,
            total_folder_name_length: 0,
            total_file_name_length: 0,
            file_flags: 0,
        }
    }
}

impl BsaHeader {
    /// Whether files are compressed unless toggled
    pub fn compressed_by_default(&self) -> bool {
        self.archive_flags & FLAG_COMPRESSED != 0
    }

    /// Whether payloads start with an embedded name that has to be skipped
    pub fn embeds_file_names(&self) -> bool {
        self.version == Version::Fallout3 as u32 && self.archive_flags & FLAG_EMBED_FILE_NAMES != 0
    }
}

/// BSA folder record
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct FolderRecord {
    /// Hash of the folder path
    pub hash: u64,

    /// Number of file records belonging to this folder
    pub file_count: u32,

    /// Offset of the folder's name, plus the length of the file name table
    pub offset: u32,
}

/// BSA file record
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct FileRecord {
    /// Hash of the file name, without its folder
    pub hash: u64,

    /// Stored size, with [`SIZE_COMPRESSION_TOGGLE`] possibly set
    pub size: u32,

    /// Absolute offset of the payload
    pub offset: u32,
}

impl FileRecord {
    /// Stored size without the compression toggle
    pub fn stored_size(&self) -> u32 {
        self.size & !SIZE_COMPRESSION_TOGGLE
    }

    /// Whether this file inverts the archive's default compression
    pub fn toggles_compression(&self) -> bool {
        self.size & SIZE_COMPRESSION_TOGGLE != 0
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::BinRead;
    use binrw::BinWrite;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::Result;

    #[rustfmt::skip]
    const HEADER: [u8; 36] = [
        0x42, 0x53, 0x41, 0x00,
        0x67, 0x00, 0x00, 0x00,
        0x24, 0x00, 0x00, 0x00,
        0x07, 0x00, 0x00, 0x00,
        0x02, 0x00, 0x00, 0x00,
        0x05, 0x00, 0x00, 0x00,
        0x0E, 0x00, 0x00, 0x00,
        0x30, 0x00, 0x00, 0x00,
        0x03, 0x00, 0x00, 0x00,
    ];

    fn expected_header() -> BsaHeader {
        BsaHeader {
            archive_flags: FLAG_FOLDER_NAMES | FLAG_FILE_NAMES | FLAG_COMPRESSED,
            folder_count: 2,
            file_count: 5,
            total_folder_name_length: 14,
            total_file_name_length: 48,
            file_flags: 3,
            ..Default::default()
        }
    }

    #[test]
    fn read_header() -> Result<()> {
        let header = BsaHeader::read(&mut Cursor::new(HEADER))?;
        assert_eq!(header, expected_header());
        assert!(header.compressed_by_default());
        assert!(!header.embeds_file_names());

        Ok(())
    }

    #[test]
    fn write_header() -> Result<()> {
        let mut actual = Vec::new();
        expected_header().write(&mut Cursor::new(&mut actual))?;
        assert_eq!(actual, HEADER);

        Ok(())
    }

    #[test]
    fn read_header_bad_magic() {
        let mut input = HEADER;
        input[0] = b'T';
        assert!(BsaHeader::read(&mut Cursor::new(input)).is_err());
    }

    #[test]
    fn embedded_names_need_newer_version() {
        let mut header = BsaHeader {
            archive_flags: FLAG_EMBED_FILE_NAMES,
            ..Default::default()
        };
        assert!(!header.embeds_file_names());

        header.version = Version::Fallout3 as u32;
        assert!(header.embeds_file_names());
    }

    #[test]
    fn version_tags() {
        assert_eq!(Version::try_from(0x67), Ok(Version::Oblivion));
        assert_eq!(Version::try_from(0x68), Ok(Version::Fallout3));
        assert_eq!(
            Version::try_from(0x69),
            Err(FormatError::UnsupportedVersion(0x69))
        );
    }

    #[test]
    fn read_write_file_record() -> Result<()> {
        #[rustfmt::skip]
        let bytes = vec![
            0x78, 0xDC, 0x08, 0x6D, 0xE5, 0xEC, 0x39, 0x79,
            0x0B, 0x00, 0x00, 0x40,
            0x24, 0x01, 0x00, 0x00,
        ];

        let record = FileRecord::read(&mut Cursor::new(&bytes))?;
        assert_eq!(record.hash, 0x7939_ECE5_6D08_DC78);
        assert_eq!(record.stored_size(), 11);
        assert!(record.toggles_compression());
        assert_eq!(record.offset, 0x124);

        let mut actual = Vec::new();
        record.write(&mut Cursor::new(&mut actual))?;
        assert_eq!(actual, bytes);

        Ok(())
    }

    #[test]
    fn read_folder_record() -> Result<()> {
        #[rustfmt::skip]
        let bytes = [
            0x73, 0x65, 0x06, 0x6D, 0x9A, 0x3A, 0x2F, 0x32,
            0x03, 0x00, 0x00, 0x00,
            0x80, 0x00, 0x00, 0x00,
        ];

        let expected = FolderRecord {
            hash: 0x322F_3A9A_6D06_6573,
            file_count: 3,
            offset: 0x80,
        };
        assert_eq!(FolderRecord::read(&mut Cursor::new(bytes))?, expected);

        Ok(())
    }

    #[test]
    fn file_type_flags() {
        assert_eq!(file_type_flag(".nif"), 0x1);
        assert_eq!(file_type_flag(".html"), 0x20);
        assert_eq!(file_type_flag(".fnt"), 0x80);
        assert_eq!(file_type_flag(".esp"), 0);
        assert_eq!(file_type_flag(""), 0);
    }
}
