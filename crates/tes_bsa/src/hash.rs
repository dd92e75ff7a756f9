//! The 64-bit path hash used to locate folders and files.
//!
//! The hash is not a checksum. It must match the hash produced by the game and by other archive
//! tools bit for bit, otherwise their archives can not be looked up and ours can not be loaded.
//!
//! The low 32 bits pack the first, last, second to last characters and the length of the stem.
//! The high 32 bits are the sum of rolling hashes of the stem's interior and of the extension.

use crate::path::{normalize, split_extension};

/// Extensions that get their hash scrambled further, with their scramble codes
const SCRAMBLED_EXTENSIONS: [(&[u8], u8); 4] = [(b".nif", 1), (b".kf", 2), (b".dds", 3), (b".wav", 4)];

/// Hash a file path, splitting off its extension.
///
/// ```
/// assert_eq!(tes_bsa::hash::hash_path("meshes/x.nif"), 0x7939_ECE5_6D08_DC78);
/// assert_eq!(tes_bsa::hash::hash_path(r"MESHES\X.NIF"), 0x7939_ECE5_6D08_DC78);
/// ```
pub fn hash_path(path: &str) -> u64 {
    let path = normalize(path);
    let (stem, extension) = split_extension(&path);
    hash_parts(stem.as_bytes(), extension.as_bytes())
}

/// Hash a folder path. Folders never have their extension split off.
pub fn hash_folder(path: &str) -> u64 {
    hash_parts(normalize(path).as_bytes(), b"")
}

/// Hash an already normalized stem and extension (including its leading dot)
pub fn hash_parts(stem: &[u8], extension: &[u8]) -> u64 {
    let len = stem.len();

    let mut hash = match (stem.first(), stem.last()) {
        (Some(first), Some(last)) => {
            let second_last = if len > 2 { stem[len - 2] } else { 0 };
            u64::from(
                u32::from(*last)
                    .wrapping_add(u32::from(second_last) << 8)
                    .wrapping_add((len as u32) << 16)
                    .wrapping_add(u32::from(*first) << 24),
            )
        }
        _ => 0,
    };

    if len > 3 {
        hash = hash.wrapping_add(rolling(&stem[1..len - 2]) << 32);
    }

    if !extension.is_empty() {
        hash = hash.wrapping_add(rolling(extension) << 32);

        if let Some(&(_, code)) = SCRAMBLED_EXTENSIONS
            .iter()
            .find(|(known, _)| *known == extension)
        {
            hash = scramble(hash, code);
        }
    }

    hash
}

fn rolling(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |h, b| h.wrapping_mul(0x1003F).wrapping_add(u64::from(*b)))
}

/// Rewrite bytes 0, 1 and 3 of the hash using the extension code
fn scramble(hash: u64, code: u8) -> u64 {
    let a = ((code & 0xFC) << 5).wrapping_add((hash >> 24) as u8);
    let b = ((code & 0xFE) << 6).wrapping_add(hash as u8);
    let c = (code << 7).wrapping_add((hash >> 8) as u8);

    (hash & !0xFF00_FFFF) | u64::from(a) << 24 | u64::from(c) << 8 | u64::from(b)
}
