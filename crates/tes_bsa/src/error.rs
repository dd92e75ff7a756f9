//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// file is an invalid bsa archive
    #[error("file is an invalid bsa archive")]
    InvalidArchive(#[from] FormatError),

    /// entry {path} is corrupt
    #[error("entry {path} is corrupt")]
    CorruptArchive {
        /// Path of the entry that failed to decode
        path: String,
        /// What was wrong with the entry
        #[source]
        reason: CorruptError,
    },

    /// {name} is {size} bytes which is too large to store
    #[error("{name} is {size} bytes which is too large to store")]
    #[diagnostic(help("entries must be smaller than 1 GiB"))]
    FileTooLarge {
        /// Path of the rejected file
        name: String,
        /// Size of the rejected file
        size: u64,
    },

    /// {0} was added more than once
    #[error("{0} was added more than once")]
    DuplicateFile(String),

    /// {path} can not be stored: {reason}
    #[error("{path} can not be stored: {reason}")]
    InvalidPath {
        /// The offending path
        path: String,
        /// Why the path was rejected
        reason: &'static str,
    },

    /// archive has grown past the 4 GiB addressable by its offsets
    #[error("archive has grown past the 4 GiB addressable by its offsets")]
    ArchiveTooLarge,
}

/// Reasons an archive is rejected while its header and directory are loaded
#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// missing BSA magic
    #[error("missing BSA magic")]
    BadMagic,

    /// unsupported version {0:#x}
    #[error("unsupported version {0:#x}")]
    UnsupportedVersion(u32),

    /// header is truncated
    #[error("header is truncated")]
    TruncatedHeader,

    /// directory is truncated
    #[error("directory is truncated")]
    TruncatedDirectory,
}

/// Reasons a single entry could not be decoded
#[derive(Error, Diagnostic, Debug)]
pub enum CorruptError {
    /// {size} bytes at offset {offset} run past the end of the archive
    #[error("{size} bytes at offset {offset} run past the end of the archive")]
    OutOfBounds {
        /// Absolute offset of the payload
        offset: u64,
        /// Stored size of the payload
        size: u64,
    },

    /// compressed payload is missing its size prefix
    #[error("compressed payload is missing its size prefix")]
    MissingSizePrefix,

    /// inflated {actual} bytes, expected {expected}
    #[error("inflated {actual} bytes, expected {expected}")]
    ShortInflate {
        /// Size declared by the payload prefix
        expected: u64,
        /// Bytes actually produced
        actual: u64,
    },

    /// Transparent wrapper for inflate failures
    #[error(transparent)]
    Inflate(std::io::Error),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
