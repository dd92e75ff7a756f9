//! Payload compression and decompression handling.

use std::borrow::Cow;
use std::io::{self, Read, Seek, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use tracing::{instrument, trace};

use crate::error::Result;

/// How the writer decides whether a file is stored compressed
///
/// The ratio modes keep the compressed candidate only when it is strictly smaller than the given
/// percentage of the original size.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum CompressionMode {
    /// Store every file as it is
    #[default]
    None,

    /// Compress files that shrink below 80% of their size
    Ratio80,

    /// Compress files that shrink below 60% of their size
    Ratio60,

    /// Compress files that shrink below 40% of their size
    Ratio40,

    /// Compress files that shrink below 20% of their size
    Ratio20,

    /// Compress every file
    Always,

    /// Compress only the files flagged individually
    Manual,
}

impl CompressionMode {
    /// Percentage the compressed size has to stay under, for the ratio modes
    pub const fn threshold(self) -> Option<u64> {
        match self {
            CompressionMode::Ratio80 => Some(80),
            CompressionMode::Ratio60 => Some(60),
            CompressionMode::Ratio40 => Some(40),
            CompressionMode::Ratio20 => Some(20),
            _ => None,
        }
    }

    /// Whether archives written in this mode set the archive wide compression flag
    pub const fn compressed_by_default(self) -> bool {
        !matches!(self, CompressionMode::None | CompressionMode::Manual)
    }
}

/// Deflate effort, from best compression to fastest
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum CompressionLevel {
    /// Deflate level 9
    Maximum,

    /// Deflate level 7
    High,

    /// Deflate level 5
    #[default]
    Normal,

    /// Deflate level 3
    Low,

    /// Deflate level 1
    Fastest,
}

impl CompressionLevel {
    /// The zlib level this maps to
    pub const fn deflate_level(self) -> u32 {
        match self {
            CompressionLevel::Maximum => 9,
            CompressionLevel::High => 7,
            CompressionLevel::Normal => 5,
            CompressionLevel::Low => 3,
            CompressionLevel::Fastest => 1,
        }
    }
}

impl From<CompressionLevel> for Compression {
    fn from(value: CompressionLevel) -> Self {
        Compression::new(value.deflate_level())
    }
}

/// Whether an entry is actually compressed, given the archive default and the entry's toggle bit
pub const fn is_compressed(archive_default: bool, toggled: bool) -> bool {
    archive_default ^ toggled
}

/// Whether a compressed candidate is small enough to keep under a ratio threshold
pub fn accepts_ratio(original: u64, compressed: u64, threshold: u64) -> bool {
    u128::from(compressed) * 100 < u128::from(original) * u128::from(threshold)
}

/// The bytes chosen for a file and whether they are deflated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload<'a> {
    /// Bytes to store, without the size prefix of compressed payloads
    pub data: Cow<'a, [u8]>,

    /// Whether `data` is a zlib stream
    pub compressed: bool,
}

impl<'a> Payload<'a> {
    fn raw(data: &'a [u8]) -> Self {
        Payload {
            data: Cow::Borrowed(data),
            compressed: false,
        }
    }
}

/// Choose between storing a file raw or deflated.
///
/// `manual` is the file's own compression flag, only consulted in [`CompressionMode::Manual`].
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn evaluate(
    data: &[u8],
    mode: CompressionMode,
    level: CompressionLevel,
    manual: bool,
) -> Result<Payload<'_>> {
    match mode {
        CompressionMode::None => return Ok(Payload::raw(data)),
        CompressionMode::Manual if !manual => return Ok(Payload::raw(data)),
        _ => {}
    }

    let candidate = deflate(data, level)?;

    if let Some(threshold) = mode.threshold() {
        if !accepts_ratio(data.len() as u64, candidate.len() as u64, threshold) {
            trace!(compressed = candidate.len(), threshold, "keeping raw bytes");
            return Ok(Payload::raw(data));
        }
    }

    Ok(Payload {
        data: Cow::Owned(candidate),
        compressed: true,
    })
}

/// Deflate a buffer into a zlib stream
pub fn deflate(data: &[u8], level: CompressionLevel) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), level.into());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Reader over the payload of a single entry
pub(crate) enum BsaBlockReader<'a, R: Read + Seek> {
    Raw(io::Take<&'a mut R>),
    Compressed(io::Take<ZlibDecoder<io::Take<&'a mut R>>>),
}

impl<'a, R: Read + Seek> BsaBlockReader<'a, R> {
    /// Wrap `limit` bytes of `reader`, which has to be positioned at the payload already.
    ///
    /// Compressed payloads must have had their size prefix consumed, `uncompressed` is the size it
    /// declared.
    pub fn new(reader: &'a mut R, limit: u64, uncompressed: Option<u64>) -> Self {
        let limit_reader = reader.take(limit);
        match uncompressed {
            None => BsaBlockReader::Raw(limit_reader),
            Some(size) => BsaBlockReader::Compressed(ZlibDecoder::new(limit_reader).take(size)),
        }
    }
}

impl<R: Read + Seek> Read for BsaBlockReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BsaBlockReader::Raw(r) => r.read(buf),
            BsaBlockReader::Compressed(r) => r.read(buf),
        }
    }

    fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        match self {
            BsaBlockReader::Raw(r) => r.read_to_end(buf),
            BsaBlockReader::Compressed(r) => r.read_to_end(buf),
        }
    }
}
