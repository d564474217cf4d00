//! Path normalization and key helpers.
//!
//! Every path that reaches the store goes through [`normalize_path`] first, so
//! `"/dir/"`, `"dir/"`, `"/dir"` and `"dir"` all address the same key.

use crate::traits::{StorageError, StorageResult};

/// Canonicalize a user-supplied path into an object key.
///
/// Backslashes count as separators, empty and `.` segments are dropped, `..`
/// removes the previous segment and control characters are stripped. The
/// result has no leading or trailing slash; the root is `""`.
pub fn normalize_path(path: &str) -> StorageResult<String> {
    let cleaned: String = path
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '\\' { '/' } else { c })
        .collect();

    let mut segments: Vec<&str> = Vec::new();
    for segment in cleaned.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(StorageError::InvalidArgument(format!(
                        "Path is outside of the bucket root: {}",
                        path
                    )));
                }
            }
            other => segments.push(other),
        }
    }

    Ok(segments.join("/"))
}

/// Normalize a path that must name an object. The root is not an object key.
pub fn normalize_key(path: &str) -> StorageResult<String> {
    let key = normalize_path(path)?;
    if key.is_empty() {
        return Err(StorageError::InvalidArgument(format!(
            "Path does not name an object: {:?}",
            path
        )));
    }
    Ok(key)
}

/// Parent directory of a normalized path, empty for top-level keys.
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Text after the last dot of a basename.
pub fn extension(basename: &str) -> Option<&str> {
    basename.rfind('.').map(|idx| &basename[idx + 1..])
}

/// Placeholder key that keeps `dir` observable while it has no other objects.
pub fn keep_path(dir: &str, keep_name: &str) -> StorageResult<String> {
    normalize_key(&format!("{}/{}", dir, keep_name))
}
