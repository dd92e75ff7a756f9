//! Types for writing BSA archives
//!

use binrw::BinWrite;
use bon::Builder;
use byteorder::{LittleEndian, WriteBytesExt};
use indexmap::IndexMap;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::mem;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

use crate::compression::{self, CompressionLevel, CompressionMode};
use crate::error::{Error, Result};
use crate::hash::{hash_folder, hash_path};
use crate::path::{self, normalize, split_extension, split_parent};
use crate::types::{
    file_type_flag, BsaHeader, FileRecord, FolderRecord, Version, FLAG_COMPRESSED, MAX_FILE_SIZE,
    SIZE_COMPRESSION_TOGGLE,
};

/// Options for how the BSA file should be written
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct BsaWriterOptions {
    /// How files decide between raw and deflated storage
    #[builder(default)]
    pub compression: CompressionMode,

    /// Deflate effort used for compressed candidates
    #[builder(default)]
    pub level: CompressionLevel,

    /// Version tag written to the header
    #[builder(default)]
    pub version: Version,
}

/// Where the bytes of a file come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Bytes already in memory
    Memory(Vec<u8>),

    /// A file on disk, read when the payload is written.
    ///
    /// Only as many bytes as the file held when it was added are stored.
    Path(PathBuf),
}

impl FileSource {
    fn len(&self) -> io::Result<u64> {
        match self {
            FileSource::Memory(data) => Ok(data.len() as u64),
            FileSource::Path(path) => Ok(fs::metadata(path)?.len()),
        }
    }

    /// Load at most `limit` bytes
    fn load(&self, limit: u64) -> io::Result<Cow<'_, [u8]>> {
        match self {
            FileSource::Memory(data) => Ok(Cow::Borrowed(data)),
            FileSource::Path(path) => {
                let mut data = Vec::new();
                fs::File::open(path)?.take(limit).read_to_end(&mut data)?;
                Ok(Cow::Owned(data))
            }
        }
    }
}

impl From<Vec<u8>> for FileSource {
    fn from(value: Vec<u8>) -> Self {
        FileSource::Memory(value)
    }
}

impl From<&[u8]> for FileSource {
    fn from(value: &[u8]) -> Self {
        FileSource::Memory(value.to_vec())
    }
}

impl From<PathBuf> for FileSource {
    fn from(value: PathBuf) -> Self {
        FileSource::Path(value)
    }
}

impl From<&Path> for FileSource {
    fn from(value: &Path) -> Self {
        FileSource::Path(value.to_path_buf())
    }
}

/// A file to be added to an archive
#[derive(Debug, Clone, Builder)]
pub struct BsaEntry {
    /// Relative path inside the archive
    #[builder(into)]
    pub name: String,

    /// Where the file's bytes come from
    #[builder(into)]
    pub source: FileSource,

    /// Compress this file when writing with [`CompressionMode::Manual`]
    #[builder(default)]
    pub compress: bool,
}

impl BsaEntry {
    /// An entry without the manual compression flag
    pub fn new(name: impl Into<String>, source: impl Into<FileSource>) -> Self {
        BsaEntry {
            name: name.into(),
            source: source.into(),
            compress: false,
        }
    }
}

/// A file left out of an archive, and why
#[derive(Debug)]
pub struct SkippedFile {
    /// Name the file was added with
    pub name: String,
    /// Why it was skipped
    pub error: Error,
}

/// The finished stream along with every file that could not be added
#[derive(Debug)]
pub struct BuildReport<W> {
    /// The stream the archive was written to
    pub inner: W,
    /// Files that were skipped
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug)]
struct PendingFile {
    name: String,
    hash: u64,
    size: u64,
    source: FileSource,
    compress: bool,
}

#[derive(Debug)]
struct PendingFolder {
    name: String,
    hash: u64,
    files: Vec<PendingFile>,
}

/// BSA archive generator
///
/// Files are collected with [`BsaWriter::add`] and laid out when [`BsaWriter::finish`] is
/// called. Folders and the files inside each folder are written in ascending hash order, so
/// identical inputs always produce identical archives.
///
/// ```
/// # fn doit() -> tes_bsa::error::Result<()>
/// # {
/// use tes_bsa::write::{BsaEntry, BsaWriter, BsaWriterOptions};
/// use tes_bsa::CompressionMode;
///
/// let mut bsa = BsaWriter::new(
///     std::io::Cursor::new(Vec::new()),
///     BsaWriterOptions::builder()
///         .compression(CompressionMode::Always)
///         .build(),
/// );
///
/// bsa.add(BsaEntry::new("meshes/hello_world.nif", b"Hello, World!".to_vec()))?;
///
/// let archive = bsa.finish()?;
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct BsaWriter<W: Write + Seek> {
    inner: W,
    options: BsaWriterOptions,
    paths: HashSet<String>,
    folders: IndexMap<String, Vec<PendingFile>>,
}

impl<W: Write + Seek> BsaWriter<W> {
    /// Initializes the archive.
    ///
    /// Nothing is written to `inner` until [`BsaWriter::finish`].
    pub fn new(inner: W, options: BsaWriterOptions) -> BsaWriter<W> {
        BsaWriter {
            inner,
            options,
            paths: HashSet::new(),
            folders: IndexMap::new(),
        }
    }

    /// Number of files added so far
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no files have been added
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Queue a file for the archive.
    ///
    /// Fails without changing the archive if the path can not be stored, was already added
    /// (ignoring case), or the file is too large for the size field.
    #[instrument(skip_all, fields(name = %entry.name), err)]
    pub fn add(&mut self, entry: BsaEntry) -> Result<()> {
        path::validate(&entry.name)?;
        let normalized = normalize(&entry.name);

        let size = entry.source.len()?;
        if size >= MAX_FILE_SIZE {
            return Err(Error::FileTooLarge {
                name: normalized,
                size,
            });
        }

        if self.paths.contains(&normalized) {
            return Err(Error::DuplicateFile(normalized));
        }

        let (folder, name) = split_parent(&normalized);
        self.folders
            .entry(folder.to_owned())
            .or_default()
            .push(PendingFile {
                name: name.to_owned(),
                hash: hash_path(name),
                size,
                source: entry.source,
                compress: entry.compress,
            });
        self.paths.insert(normalized);

        Ok(())
    }

    /// Lay out and write the archive.
    ///
    /// This will return the writer, positioned at the end of the archive.
    #[instrument(skip(self), fields(files = self.paths.len()), err)]
    pub fn finish(mut self) -> Result<W> {
        let mut folders = mem::take(&mut self.folders)
            .into_iter()
            .map(|(name, mut files)| {
                files.sort_by_key(|f| f.hash);
                PendingFolder {
                    hash: hash_folder(&name),
                    name,
                    files,
                }
            })
            .collect::<Vec<_>>();
        folders.sort_by_key(|f| f.hash);

        let header = self.header(&folders);
        debug!(?header, "writing header");
        header.write(&mut self.inner)?;

        let mut folder_slots = Vec::with_capacity(folders.len());
        for folder in &folders {
            folder_slots.push(self.inner.stream_position()?);
            FolderRecord {
                hash: folder.hash,
                file_count: folder.files.len() as u32,
                offset: 0,
            }
            .write(&mut self.inner)?;
        }

        let mut file_slots = Vec::with_capacity(self.paths.len());
        for (folder, slot) in folders.iter().zip(folder_slots) {
            let position = self.inner.stream_position()?;
            let offset = to_offset(position + u64::from(header.total_file_name_length))?;
            self.patch(slot + 12, &[offset])?;

            self.inner.write_u8(folder.name.len() as u8 + 1)?;
            self.inner.write_all(folder.name.as_bytes())?;
            self.inner.write_u8(0)?;

            for file in &folder.files {
                file_slots.push(self.inner.stream_position()?);
                FileRecord {
                    hash: file.hash,
                    ..Default::default()
                }
                .write(&mut self.inner)?;
            }
        }

        for file in folders.iter().flat_map(|f| &f.files) {
            self.inner.write_all(file.name.as_bytes())?;
            self.inner.write_u8(0)?;
        }

        let files = folders
            .iter()
            .flat_map(|folder| folder.files.iter().map(move |file| (folder, file)));
        for ((folder, file), slot) in files.zip(file_slots) {
            let (size, offset) = self.write_payload(&folder.name, file)?;
            self.patch(slot + 8, &[size, offset])?;
        }

        self.inner.flush()?;
        Ok(self.inner)
    }

    fn header(&self, folders: &[PendingFolder]) -> BsaHeader {
        let mut header = BsaHeader {
            version: self.options.version as u32,
            folder_count: folders.len() as u32,
            ..Default::default()
        };
        if self.options.compression.compressed_by_default() {
            header.archive_flags |= FLAG_COMPRESSED;
        }

        for folder in folders {
            header.total_folder_name_length += folder.name.len() as u32 + 1;
            for file in &folder.files {
                header.file_count += 1;
                header.total_file_name_length += file.name.len() as u32 + 1;
                header.file_flags |= file_type_flag(split_extension(&file.name).1);
            }
        }

        header
    }

    /// Append a file's payload, returning its size field and offset
    fn write_payload(&mut self, folder: &str, file: &PendingFile) -> Result<(u32, u32)> {
        let data = file.source.load(file.size)?;
        debug!(name = %path::join(folder, &file.name), size = data.len(), "writing payload");

        let mut payload = compression::evaluate(
            &data,
            self.options.compression,
            self.options.level,
            file.compress,
        )?;
        if payload.compressed && payload.data.len() as u64 + 4 >= MAX_FILE_SIZE {
            warn!(name = %file.name, "compressed payload does not fit, storing raw bytes");
            payload = compression::Payload {
                data: Cow::Borrowed(data.as_ref()),
                compressed: false,
            };
        }

        let offset = to_offset(self.inner.stream_position()?)?;
        let mut size = payload.data.len() as u32;
        if payload.compressed {
            self.inner.write_u32::<LittleEndian>(data.len() as u32)?;
            size += 4;
        }
        self.inner.write_all(&payload.data)?;

        if payload.compressed != self.options.compression.compressed_by_default() {
            size |= SIZE_COMPRESSION_TOGGLE;
        }

        Ok((size, offset))
    }

    /// Overwrite placeholder fields at `at`, returning to the end of the stream
    fn patch(&mut self, at: u64, values: &[u32]) -> Result<()> {
        let end = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::Start(at))?;
        for value in values {
            self.inner.write_u32::<LittleEndian>(*value)?;
        }
        self.inner.seek(SeekFrom::Start(end))?;
        Ok(())
    }
}

fn to_offset(position: u64) -> Result<u32> {
    u32::try_from(position).map_err(|_| Error::ArchiveTooLarge)
}

/// Build an archive from a list of files.
///
/// Files that can not be stored are reported in [`BuildReport::skipped`] while the rest of the
/// archive is still written.
#[instrument(skip_all, err)]
pub fn build<W: Write + Seek>(
    inner: W,
    entries: impl IntoIterator<Item = BsaEntry>,
    options: BsaWriterOptions,
) -> Result<BuildReport<W>> {
    let mut writer = BsaWriter::new(inner, options);
    let mut skipped = Vec::new();

    for entry in entries {
        let name = entry.name.clone();
        match writer.add(entry) {
            Ok(()) => {}
            Err(
                error @ (Error::FileTooLarge { .. }
                | Error::DuplicateFile(_)
                | Error::InvalidPath { .. }),
            ) => {
                warn!(%name, %error, "skipping file");
                skipped.push(SkippedFile { name, error });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(BuildReport {
        inner: writer.finish()?,
        skipped,
    })
}
