//! Path normalization shared by hashing, reading and writing.
//!
//! Archive paths are case-insensitive and always use `\` as their separator. Every path is
//! normalized before it is hashed or stored so that `Meshes/X.nif` and `meshes\x.nif` refer to
//! the same entry.

use crate::error::{Error, Result};

/// Separator used inside archives
pub const SEPARATOR: char = '\\';

/// Longest folder name that fits behind its u8 length prefix (which includes the terminator)
pub const MAX_FOLDER_NAME: usize = u8::MAX as usize - 1;

/// Lower-case a path and canonicalize its separators.
///
/// Leading and repeated separators are dropped.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        let c = match c {
            '/' | '\\' => SEPARATOR,
            c => c.to_ascii_lowercase(),
        };
        if c == SEPARATOR && (out.is_empty() || out.ends_with(SEPARATOR)) {
            continue;
        }
        out.push(c);
    }
    if out.ends_with(SEPARATOR) {
        out.pop();
    }
    out
}

/// Split a normalized path into its parent folder and file name.
///
/// Files at the root of the archive have an empty folder.
pub fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind(SEPARATOR) {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

/// Split a path into its stem and extension, the extension keeping its leading dot.
///
/// Only the final component can carry an extension. A trailing dot is dropped without producing
/// an extension.
pub fn split_extension(path: &str) -> (&str, &str) {
    let start = path.rfind(SEPARATOR).map_or(0, |i| i + 1);
    match path[start..].rfind('.') {
        Some(i) if start + i + 1 == path.len() => (&path[..start + i], ""),
        Some(i) => (&path[..start + i], &path[start + i..]),
        None => (path, ""),
    }
}

/// Join a folder and a file name into an archive path
pub fn join(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_owned()
    } else {
        format!("{folder}{SEPARATOR}{name}")
    }
}

/// Check that a relative path is safe to store in, or extract from, an archive.
///
/// Rejects empty, absolute and drive-qualified paths, `.` and `..` segments, non-ASCII names and
/// folders whose names do not fit the folder name length prefix.
pub fn validate(path: &str) -> Result<()> {
    let invalid = |reason| Error::InvalidPath {
        path: path.to_owned(),
        reason,
    };

    if path.is_empty() {
        return Err(invalid("path is empty"));
    }
    if !path.is_ascii() {
        return Err(invalid("path contains non-ascii characters"));
    }
    if path.starts_with(['/', '\\']) || path.as_bytes().get(1) == Some(&b':') {
        return Err(invalid("path is absolute"));
    }
    if path
        .split(['/', '\\'])
        .any(|segment| segment == "." || segment == "..")
    {
        return Err(invalid("path escapes its root"));
    }

    if path.ends_with(['/', '\\']) {
        return Err(invalid("path has no file name"));
    }

    let normalized = normalize(path);
    let (folder, _) = split_parent(&normalized);
    if folder.len() > MAX_FOLDER_NAME {
        return Err(invalid("folder name is longer than 254 bytes"));
    }

    Ok(())
}
