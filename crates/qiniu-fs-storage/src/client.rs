//! Collaborator traits for the vendor SDK.
//!
//! The adapter never talks to the object store directly. Applications plug in
//! implementations of these traits built on top of the vendor SDK (signing,
//! request encoding and resumable chunking all live there). The in-memory
//! implementation in [`crate::memory`] backs the tests.

use crate::traits::{ByteReader, ByteStream, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use qiniu_fs_core::ObjectRecord;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound the store accepts for a single listing page.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Upper bound on operations in one batch request.
pub const MAX_BATCH_OPERATIONS: usize = 1000;

/// One page request against a bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub bucket: String,
    pub prefix: String,
    pub marker: Option<String>,
    pub limit: usize,
    pub delimiter: Option<String>,
}

impl ListRequest {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            marker: None,
            limit: MAX_LIST_LIMIT,
            delimiter: None,
        }
    }

    pub fn with_marker(mut self, marker: Option<String>) -> Self {
        self.marker = marker;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.clamp(1, MAX_LIST_LIMIT);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub items: Vec<ObjectRecord>,
    /// Cursor for the next page; `None` or empty when the listing is exhausted
    pub marker: Option<String>,
}

impl ListPage {
    pub fn next_marker(&self) -> Option<&str> {
        self.marker.as_deref().filter(|m| !m.is_empty())
    }
}

/// Result for one key of a batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub key: String,
    pub code: u16,
    pub error: Option<String>,
}

impl BatchOutcome {
    pub fn ok(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            code: 200,
            error: None,
        }
    }

    pub fn failed(key: impl Into<String>, code: u16, error: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            code,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 200
    }
}

/// Parameters forwarded with an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub mime: String,
    /// Custom variables, keys always start with `x:`
    pub params: BTreeMap<String, String>,
    pub check_crc: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub key: String,
    pub hash: Option<String>,
}

/// A persistent data-processing job submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfopRequest {
    pub bucket: String,
    pub key: String,
    /// Processing commands, joined with `;` by the store
    pub fops: Vec<String>,
    pub pipeline: Option<String>,
    pub notify_url: Option<String>,
    pub force: bool,
}

#[async_trait]
pub trait BucketClient: Send + Sync {
    async fn stat(&self, bucket: &str, key: &str) -> StorageResult<ObjectRecord>;

    async fn list(&self, request: &ListRequest) -> StorageResult<ListPage>;

    async fn move_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
        force: bool,
    ) -> StorageResult<()>;

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
        force: bool,
    ) -> StorageResult<()>;

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Delete many keys in one request. Transport failures are errors; per-key
    /// failures are reported in the outcomes, in request order.
    async fn batch_delete(&self, bucket: &str, keys: &[String])
        -> StorageResult<Vec<BatchOutcome>>;
}

#[async_trait]
pub trait UploadClient: Send + Sync {
    /// Single-request upload.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        options: &PutOptions,
    ) -> StorageResult<UploadReceipt>;

    /// Chunked upload of `size` bytes read from `reader`.
    async fn put_resumable(
        &self,
        bucket: &str,
        key: &str,
        reader: ByteReader,
        size: u64,
        options: &PutOptions,
    ) -> StorageResult<UploadReceipt>;
}

/// Credential-bound signing operations.
pub trait UrlSigner: Send + Sync {
    /// Append a time-limited token to a download URL.
    fn private_download_url(&self, url: &str, expires: Duration) -> StorageResult<String>;

    /// Upload token scoped to a bucket, or to a single key when given.
    fn upload_token(
        &self,
        bucket: &str,
        key: Option<&str>,
        expires: Duration,
    ) -> StorageResult<String>;
}

#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, url: &str) -> StorageResult<Bytes>;

    async fn fetch_stream(&self, url: &str) -> StorageResult<ByteStream>;
}

#[async_trait]
pub trait PersistentFop: Send + Sync {
    /// Submit a job and return its persistent id.
    async fn execute(&self, request: &PfopRequest) -> StorageResult<String>;

    /// Raw job status document.
    async fn status(&self, id: &str) -> StorageResult<serde_json::Value>;
}

/// Pre-built collaborators for one credential set.
#[derive(Clone)]
pub struct QiniuClients {
    pub bucket: Arc<dyn BucketClient>,
    pub upload: Arc<dyn UploadClient>,
    pub signer: Arc<dyn UrlSigner>,
    pub downloader: Arc<dyn Downloader>,
    pub pfop: Option<Arc<dyn PersistentFop>>,
}

impl QiniuClients {
    pub fn new(
        bucket: Arc<dyn BucketClient>,
        upload: Arc<dyn UploadClient>,
        signer: Arc<dyn UrlSigner>,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        Self {
            bucket,
            upload,
            signer,
            downloader,
            pfop: None,
        }
    }

    pub fn with_pfop(mut self, pfop: Arc<dyn PersistentFop>) -> Self {
        self.pfop = Some(pfop);
        self
    }
}
