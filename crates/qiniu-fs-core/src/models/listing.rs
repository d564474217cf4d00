//! Filesystem-shaped listing entries.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::ObjectRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// One entry of a directory listing or a metadata lookup.
///
/// File entries come from an [`ObjectRecord`]; directory entries are synthesized
/// from the keys below them and carry no size, mimetype or timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub basename: String,
    /// Parent directory, empty for top-level paths
    pub dirname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ListingEntry {
    /// File entry for a store record. The record key must already be normalized.
    pub fn file(record: &ObjectRecord) -> Self {
        let (dirname, basename) = split_path(&record.key);
        let extension = basename.rfind('.').map(|dot| basename[dot + 1..].to_string());
        Self {
            path: record.key.clone(),
            kind: EntryKind::File,
            basename: basename.to_string(),
            dirname: dirname.to_string(),
            extension,
            size: Some(record.size),
            mimetype: Some(record.mime_type.clone()),
            timestamp: Some(record.put_time),
        }
    }

    /// Synthetic directory entry.
    pub fn dir(path: &str) -> Self {
        let (dirname, basename) = split_path(path);
        Self {
            path: path.to_string(),
            kind: EntryKind::Dir,
            basename: basename.to_string(),
            dirname: dirname.to_string(),
            extension: None,
            size: None,
            mimetype: None,
            timestamp: None,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(slash) => (&path[..slash], &path[slash + 1..]),
        None => ("", path),
    }
}

/// Object visibility as understood by the storage contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Display for Visibility {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
        }
    }
}
