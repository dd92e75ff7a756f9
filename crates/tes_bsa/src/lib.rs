//! This library handles reading from and creating **BSA** files used by *The Elder Scrolls IV: Oblivion*
//! and *Fallout 3*.
//!
//! # BSA Archive Format Documentation
//!
//! A BSA file packs many named files into a single blob. Files are grouped by folder and located
//! by a 64-bit hash of their path, see [`hash`]. Each file may be stored raw or deflated.
//!
//! ## File Structure
//!
//! A BSA file consists of a header, the folder records, one block per folder holding its name and
//! file records, the file name table and finally the file data.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "BSA\0"                                           |
//! | 0x0004         | Version                | 4 bytes: 0x67 (Oblivion) or 0x68 (Fallout 3)               |
//! | 0x0008         | Folder Record Offset   | 4 bytes: Always 36                                         |
//! | 0x000C         | Archive Flags          | 4 bytes: See below                                         |
//! | 0x0010         | Folder Count           | 4 bytes: Number of folder records                          |
//! | 0x0014         | File Count             | 4 bytes: Number of file records                            |
//! | 0x0018         | Folder Names Length    | 4 bytes: Length of all folder names including terminators  |
//! | 0x001C         | File Names Length      | 4 bytes: Length of the file name table                     |
//! | 0x0020         | File Flags             | 4 bytes: Kinds of files stored, informational only         |
//!
//! ### Archive Flags
//!
//! - `0x1`: Folder names are stored
//! - `0x2`: File names are stored
//! - `0x4`: Files are compressed by default
//! - `0x100`: Every payload starts with the file's name (version 0x68 only)
//!
//! ### Folder Records
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Hash                   | 8 bytes: Hash of the folder path                        |
//! | 0x0008         | File Count             | 4 bytes: Number of files in the folder                  |
//! | 0x000C         | Offset                 | 4 bytes: Offset of the folder block plus the length of the file name table |
//!
//! ### Folder Blocks
//!
//! Each folder block holds the folder name, prefixed by its length (including the terminator) as
//! a single byte and terminated by a null, followed by the folder's file records.
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Hash                   | 8 bytes: Hash of the file name                          |
//! | 0x0008         | Size                   | 4 bytes: Stored size, bit 30 inverts the default compression |
//! | 0x000C         | Offset                 | 4 bytes: Offset of the file data from the start of the archive |
//!
//! ### File Name Table
//!
//! One null terminated name per file record, in the same order as the records.
//!
//! ### File Data
//!
//! A file is compressed when the archive flag `0x4` and bit 30 of its size differ. Compressed data
//! starts with the 4-byte uncompressed size followed by a zlib stream, raw data is stored as it is.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.bsa`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Paths**: Lower-case, separated by `\`
//!

pub mod compression;
pub mod error;
pub mod hash;
pub mod path;
pub mod read;
pub mod types;
pub mod write;

pub use compression::{CompressionLevel, CompressionMode};
pub use read::BsaArchive;
pub use write::{build, BsaEntry, BsaWriter, BsaWriterOptions};
