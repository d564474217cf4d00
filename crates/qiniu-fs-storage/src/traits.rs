//! Storage contract
//!
//! This module defines the filesystem-style contract the adapter fulfils and the
//! error type every operation reports.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use qiniu_fs_core::{ListingEntry, Visibility};
use std::collections::BTreeMap;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Store code for "no such file or directory".
pub const NOT_FOUND_CODE: u16 = 612;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failure reported by a store collaborator
    #[error("Store error {code}: {message}")]
    Store { code: u16, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Batch delete failed for {} of {} keys", .failed.len(), .total)]
    BatchDelete { failed: Vec<String>, total: usize },

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn store(code: u16, message: impl Into<String>) -> Self {
        StorageError::Store {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(key: &str) -> Self {
        StorageError::store(NOT_FOUND_CODE, format!("no such file or directory: {}", key))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Store { code, .. } if *code == NOT_FOUND_CODE)
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked object contents
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Upload source for stream writes
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Per-write options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub mime: Option<String>,
    /// Custom upload variables. Only keys starting with `x:` reach the store.
    pub params: BTreeMap<String, String>,
    pub check_crc: bool,
}

impl WriteOptions {
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_check_crc(mut self, check_crc: bool) -> Self {
        self.check_crc = check_crc;
        self
    }

    pub fn mime_or_default(&self) -> &str {
        self.mime.as_deref().unwrap_or(DEFAULT_MIME)
    }

    pub fn forwarded_params(&self) -> BTreeMap<String, String> {
        self.params
            .iter()
            .filter(|(k, _)| k.starts_with("x:"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    pub path: String,
}

/// Filesystem-style storage contract
///
/// Paths are normalized by the implementation: leading and trailing slashes,
/// empty segments and `.` segments are ignored. Directories exist implicitly
/// whenever some object lives below them.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn write(
        &self,
        path: &str,
        contents: Bytes,
        options: &WriteOptions,
    ) -> StorageResult<WriteResult>;

    /// Write from a reader. `size` is the content length when known.
    async fn write_stream(
        &self,
        path: &str,
        reader: ByteReader,
        size: Option<u64>,
        options: &WriteOptions,
    ) -> StorageResult<WriteResult>;

    async fn update(
        &self,
        path: &str,
        contents: Bytes,
        options: &WriteOptions,
    ) -> StorageResult<WriteResult> {
        self.write(path, contents, options).await
    }

    async fn update_stream(
        &self,
        path: &str,
        reader: ByteReader,
        size: Option<u64>,
        options: &WriteOptions,
    ) -> StorageResult<WriteResult> {
        self.write_stream(path, reader, size, options).await
    }

    async fn rename(&self, from: &str, to: &str) -> StorageResult<()>;

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()>;

    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Delete every object below `dir`, placeholders included.
    async fn delete_dir(&self, dir: &str) -> StorageResult<()>;

    async fn create_dir(&self, dir: &str, options: &WriteOptions) -> StorageResult<ListingEntry>;

    /// True for an existing object or a non-empty directory.
    async fn has(&self, path: &str) -> StorageResult<bool>;

    async fn read(&self, path: &str) -> StorageResult<Bytes>;

    async fn read_stream(&self, path: &str) -> StorageResult<ByteStream>;

    async fn list_contents(&self, dir: &str, recursive: bool) -> StorageResult<Vec<ListingEntry>>;

    async fn get_metadata(&self, path: &str) -> StorageResult<ListingEntry>;

    async fn get_size(&self, path: &str) -> StorageResult<u64> {
        let entry = self.get_metadata(path).await?;
        entry
            .size
            .ok_or_else(|| StorageError::InvalidArgument(format!("{} has no size", path)))
    }

    async fn get_mimetype(&self, path: &str) -> StorageResult<String> {
        let entry = self.get_metadata(path).await?;
        entry
            .mimetype
            .ok_or_else(|| StorageError::InvalidArgument(format!("{} has no mimetype", path)))
    }

    async fn get_timestamp(&self, path: &str) -> StorageResult<i64> {
        let entry = self.get_metadata(path).await?;
        entry
            .timestamp
            .ok_or_else(|| StorageError::InvalidArgument(format!("{} has no timestamp", path)))
    }

    /// Objects carry no ACL here, so everything reads as public.
    async fn get_visibility(&self, _path: &str) -> StorageResult<Visibility> {
        Ok(Visibility::Public)
    }

    async fn set_visibility(&self, _path: &str, _visibility: Visibility) -> StorageResult<()> {
        Ok(())
    }
}
