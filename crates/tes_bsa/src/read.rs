//! Types for reading BSA archives
//!

use binrw::BinRead;
use byteorder::{LittleEndian, ReadBytesExt};
use indexmap::IndexMap;
use std::{
    fmt::{self, Debug},
    fs::File,
    io::{self, BufReader, Cursor, Read, Seek, SeekFrom},
    path::Path,
};
use tracing::{debug, instrument};

use crate::{
    compression::{is_compressed, BsaBlockReader},
    error::{CorruptError, Error, FormatError, Result},
    hash::hash_path,
    path::{join, normalize},
    types::{BsaHeader, FileRecord, FolderRecord, Version, HEADER_SIZE},
};

/// Structure describing where an entry's payload lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BsaFileData {
    /// Normalized path of the entry
    pub path: Box<str>,
    /// Absolute offset of the payload
    pub offset: u64,
    /// Size of the payload in the archive, including any embedded name or size prefix
    pub stored_size: u64,
    /// Whether the payload is deflated, after resolving the archive default
    pub compressed: bool,
}

/// A struct for reading an entry from a BSA file
pub struct BsaFile<'a, R: Read + Seek> {
    data: &'a BsaFileData,
    size: u64,
    reader: BsaBlockReader<'a, R>,
}

impl<R: Read + Seek> Debug for BsaFile<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BsaFile({:#?})", self.data)
    }
}

/// Methods for retrieving information on BSA file entries
impl<R: Read + Seek> BsaFile<'_, R> {
    /// Get the normalized path of the file
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`). Check it with [`crate::path::validate`]
    /// before writing to it.
    pub fn name(&self) -> &str {
        &self.data.path
    }

    /// Get the size of the file, in bytes, when decoded
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the size of the file, in bytes, in the archive
    pub fn stored_size(&self) -> u64 {
        self.data.stored_size
    }

    /// Whether the file is stored deflated
    pub fn is_compressed(&self) -> bool {
        self.data.compressed
    }
}

impl<R: Read + Seek> Read for BsaFile<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// The directory loaded when an archive is opened
#[derive(Debug)]
struct Directory {
    header: BsaHeader,
    index: IndexMap<u64, BsaFileData>,
    paths: Vec<Box<str>>,
    stream_len: u64,
}

/// BSA archive reader
///
/// The directory is loaded eagerly when the archive is opened, payloads are only read when
/// requested. Dropping the archive releases the underlying reader.
///
/// ```no_run
/// fn dump_bsa(path: &str) -> tes_bsa::error::Result<()> {
///     let mut bsa = tes_bsa::BsaArchive::open(path)?;
///
///     for name in bsa.paths().map(str::to_owned).collect::<Vec<_>>() {
///         if let Some(data) = bsa.get_file(&name)? {
///             println!("{name}: {} bytes", data.len());
///         }
///     }
///
///     Ok(())
/// }
/// ```
pub struct BsaArchive<R> {
    reader: R,
    directory: Directory,
}

impl BsaArchive<BufReader<File>> {
    /// Open the archive at `path`
    #[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R> BsaArchive<R> {
    /// Number of entries contained in this BSA.
    pub fn len(&self) -> usize {
        self.directory.paths.len()
    }

    /// Whether this BSA archive contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the normalized paths of all entries, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.directory.paths.iter().map(|s| s.as_ref())
    }

    /// Returns the version the archive was written with.
    pub fn version(&self) -> Version {
        // checked when the header was read
        Version::try_from(self.directory.header.version).unwrap_or_default()
    }

    /// Returns whether files are compressed unless their record toggles it.
    pub fn is_compressed_by_default(&self) -> bool {
        self.directory.header.compressed_by_default()
    }

    /// Returns the informational file type flags of the archive.
    pub fn file_flags(&self) -> u32 {
        self.directory.header.file_flags
    }

    /// Returns the header as it was read.
    pub fn header(&self) -> &BsaHeader {
        &self.directory.header
    }

    /// Get the location of an entry, if it's present.
    ///
    /// Entries are located by hash so a different path with a colliding hash resolves to the same
    /// entry.
    pub fn entry(&self, path: &str) -> Option<&BsaFileData> {
        self.directory.index.get(&hash_path(path))
    }

    /// Whether an entry exists for `path`
    pub fn contains(&self, path: &str) -> bool {
        self.entry(path).is_some()
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> BsaArchive<R> {
    /// Read a BSA archive, loading its directory.
    #[instrument(skip_all, err)]
    pub fn new(mut reader: R) -> Result<BsaArchive<R>> {
        let directory = Self::read_directory(&mut reader)?;
        debug!(
            files = directory.paths.len(),
            folders = directory.header.folder_count,
            "loaded directory"
        );
        Ok(BsaArchive { reader, directory })
    }

    /// Read the whole file stored at `path`.
    ///
    /// A missing entry is not an error and yields `None`.
    #[instrument(skip(self), err)]
    pub fn get_file(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        let Some(mut file) = self.by_path(path)? else {
            return Ok(None);
        };

        let expected = file.size();
        let compressed = file.is_compressed();
        let mut buffer = Vec::with_capacity(expected.min(file.stored_size() * 4) as usize);
        let corrupt = |reason| Error::CorruptArchive {
            path: path.to_owned(),
            reason,
        };

        file.read_to_end(&mut buffer).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
                corrupt(CorruptError::Inflate(e))
            }
            _ => Error::from(e),
        })?;

        if buffer.len() as u64 != expected {
            return Err(corrupt(if compressed {
                CorruptError::ShortInflate {
                    expected,
                    actual: buffer.len() as u64,
                }
            } else {
                CorruptError::OutOfBounds {
                    offset: file.data.offset,
                    size: file.data.stored_size,
                }
            }));
        }

        Ok(Some(buffer))
    }

    /// Open a streaming reader for the file stored at `path`, if it is present.
    pub fn by_path(&mut self, path: &str) -> Result<Option<BsaFile<'_, R>>> {
        let Some(data) = self.directory.index.get(&hash_path(path)) else {
            return Ok(None);
        };

        let corrupt = |reason| Error::CorruptArchive {
            path: data.path.to_string(),
            reason,
        };

        let end = data.offset + data.stored_size;
        if end > self.directory.stream_len {
            return Err(corrupt(CorruptError::OutOfBounds {
                offset: data.offset,
                size: data.stored_size,
            }));
        }

        self.reader.seek(SeekFrom::Start(data.offset))?;
        let mut remaining = data.stored_size;

        if self.directory.header.embeds_file_names() {
            let name_len = u64::from(self.reader.read_u8()?) + 1;
            if name_len > remaining {
                return Err(corrupt(CorruptError::OutOfBounds {
                    offset: data.offset,
                    size: data.stored_size,
                }));
            }
            self.reader.seek(SeekFrom::Current(name_len as i64 - 1))?;
            remaining -= name_len;
        }

        let (size, uncompressed) = if data.compressed {
            if remaining < 4 {
                return Err(corrupt(CorruptError::MissingSizePrefix));
            }
            let size = u64::from(self.reader.read_u32::<LittleEndian>()?);
            remaining -= 4;
            (size, Some(size))
        } else {
            (remaining, None)
        };

        Ok(Some(BsaFile {
            data,
            size,
            reader: BsaBlockReader::new(&mut self.reader, remaining, uncompressed),
        }))
    }

    fn read_header(reader: &mut R) -> Result<BsaHeader> {
        let mut buffer = [0u8; HEADER_SIZE as usize];
        reader.read_exact(&mut buffer).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => FormatError::TruncatedHeader.into(),
            _ => Error::from(e),
        })?;

        let header = BsaHeader::read(&mut Cursor::new(buffer)).map_err(|e| match e {
            binrw::Error::BadMagic { .. } => FormatError::BadMagic.into(),
            e => Error::from(e),
        })?;
        Version::try_from(header.version)?;

        Ok(header)
    }

    fn read_directory(reader: &mut R) -> Result<Directory> {
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let header = Self::read_header(reader)?;

        // records and names alone must fit before anything is allocated from the counts
        let directory_len = (u64::from(header.folder_count) + u64::from(header.file_count)) * 16
            + u64::from(header.total_folder_name_length)
            + u64::from(header.total_file_name_length);
        if u64::from(header.folder_records_offset) + directory_len > stream_len {
            return Err(FormatError::TruncatedDirectory.into());
        }
        reader.seek(SeekFrom::Start(u64::from(header.folder_records_offset)))?;

        let mut folders = (0..header.folder_count)
            .map(|_| FolderRecord::read(reader).map_err(directory_error))
            .collect::<Result<Vec<_>>>()?;
        folders.sort_by_key(|f| f.offset);

        let mut files: Vec<(String, FileRecord)> = Vec::with_capacity(header.file_count as usize);
        for folder in &folders {
            let name_start = u64::from(folder.offset)
                .checked_sub(u64::from(header.total_file_name_length))
                .ok_or(FormatError::TruncatedDirectory)?;
            reader.seek(SeekFrom::Start(name_start))?;

            let name_len = reader.read_u8().map_err(io_directory_error)?;
            let mut name = vec![0u8; name_len as usize];
            reader.read_exact(&mut name).map_err(io_directory_error)?;
            if name.last() == Some(&0) {
                name.pop();
            }
            let name = String::from_utf8_lossy(&name).into_owned();

            for _ in 0..folder.file_count {
                let record = FileRecord::read(reader).map_err(directory_error)?;
                files.push((name.clone(), record));
            }
        }

        let mut names = vec![0u8; header.total_file_name_length as usize];
        reader.read_exact(&mut names).map_err(io_directory_error)?;
        let mut names = names.split(|c| *c == 0);

        let default_compressed = header.compressed_by_default();
        let mut index = IndexMap::with_capacity(files.len());
        let mut paths = Vec::with_capacity(files.len());
        for (folder, record) in files {
            let name = names.next().ok_or(FormatError::TruncatedDirectory)?;
            let path = normalize(&join(&folder, &String::from_utf8_lossy(name)));

            let data = BsaFileData {
                path: path.as_str().into(),
                offset: u64::from(record.offset),
                stored_size: u64::from(record.stored_size()),
                compressed: is_compressed(default_compressed, record.toggles_compression()),
            };
            // colliding hashes resolve to the last entry
            index.insert(hash_path(&path), data);
            paths.push(path.into_boxed_str());
        }
        paths.sort();

        Ok(Directory {
            header,
            index,
            paths,
            stream_len,
        })
    }
}

fn directory_error(e: binrw::Error) -> Error {
    if e.is_eof() {
        FormatError::TruncatedDirectory.into()
    } else {
        e.into()
    }
}

fn io_directory_error(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => FormatError::TruncatedDirectory.into(),
        _ => e.into(),
    }
}
