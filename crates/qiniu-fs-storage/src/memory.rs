//! In-memory collaborators
//!
//! [`MemoryStore`] implements every collaborator trait against per-bucket maps so
//! the adapter can run without network access. It also supports failure
//! injection for listing pages and batch deletes.

use crate::client::{
    BatchOutcome, BucketClient, Downloader, ListPage, ListRequest, PersistentFop, PfopRequest,
    PutOptions, QiniuClients, UploadClient, UploadReceipt, UrlSigner,
};
use crate::factory::ClientFactory;
use crate::traits::{ByteReader, ByteStream, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use qiniu_fs_core::{ObjectRecord, QiniuConfig};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::AsyncReadExt;

const FILE_EXISTS_CODE: u16 = 614;
const INJECTED_FAILURE_CODE: u16 = 599;
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    mime: String,
    put_time: i64,
    params: BTreeMap<String, String>,
    resumable: bool,
}

#[derive(Default)]
struct State {
    buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
    /// Download domain (host plus optional sub-path) to bucket
    domains: BTreeMap<String, String>,
    list_calls: usize,
    fail_list_call: Option<usize>,
    failing_deletes: BTreeSet<String>,
    batch_calls: usize,
    fail_batch_call: Option<usize>,
    jobs: Vec<PfopRequest>,
}

/// Shared in-memory object store
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Collaborator bundle backed by this store.
    pub fn clients(&self) -> QiniuClients {
        let store = Arc::new(self.clone());
        QiniuClients::new(store.clone(), store.clone(), store.clone(), store.clone())
            .with_pfop(store)
    }

    /// Route downloads for `domain` (host with optional sub-path) to `bucket`.
    pub fn register_domain(&self, domain: &str, bucket: &str) {
        self.state()
            .domains
            .insert(domain.trim_matches('/').to_string(), bucket.to_string());
    }

    /// Insert an object directly, bypassing the upload path.
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>, mime: &str) {
        let object = StoredObject {
            data: data.into(),
            mime: mime.to_string(),
            put_time: now_ticks(),
            params: BTreeMap::new(),
            resumable: false,
        };
        self.state()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.state()
            .buckets
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key))
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.data.clone())
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Custom variables stored with the last upload of `key`.
    pub fn params(&self, bucket: &str, key: &str) -> Option<BTreeMap<String, String>> {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.params.clone())
    }

    /// Whether `key` was last written through the resumable path.
    pub fn was_resumable(&self, bucket: &str, key: &str) -> bool {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .is_some_and(|object| object.resumable)
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    /// Fail the listing call `n` calls from now (0 is the next call).
    pub fn fail_list_call(&self, n: usize) {
        let mut state = self.state();
        state.fail_list_call = Some(state.list_calls + n);
    }

    /// Report a per-key failure whenever `key` is part of a batch delete.
    pub fn fail_delete(&self, key: &str) {
        self.state().failing_deletes.insert(key.to_string());
    }

    /// Fail the whole batch delete request `n` calls from now (0 is the next call).
    pub fn fail_batch_call(&self, n: usize) {
        let mut state = self.state();
        state.fail_batch_call = Some(state.batch_calls + n);
    }

    pub fn submitted_jobs(&self) -> Vec<PfopRequest> {
        self.state().jobs.clone()
    }

    fn store_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        options: &PutOptions,
        resumable: bool,
    ) -> UploadReceipt {
        let object = StoredObject {
            data,
            mime: options.mime.clone(),
            put_time: now_ticks(),
            params: options.params.clone(),
            resumable,
        };
        self.state()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
        UploadReceipt {
            key: key.to_string(),
            hash: None,
        }
    }

    fn resolve_url(&self, url: &str) -> StorageResult<(String, String)> {
        let without_scheme = url
            .split_once("://")
            .map(|(_, rest)| rest)
            .ok_or_else(|| StorageError::DownloadFailed(format!("Not a URL: {}", url)))?;
        let without_token = strip_token(without_scheme);

        let state = self.state();
        for (domain, bucket) in &state.domains {
            if let Some(path) = without_token
                .strip_prefix(domain.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
            {
                return Ok((bucket.clone(), path.replace("%20", " ")));
            }
        }
        Err(StorageError::DownloadFailed(format!(
            "No bucket serves {}",
            url
        )))
    }
}

fn now_ticks() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(0) / 100
}

/// Remove the signature query appended by [`MemoryStore::private_download_url`].
fn strip_token(url: &str) -> &str {
    let cut = [url.rfind("?e="), url.rfind("&e=")]
        .into_iter()
        .flatten()
        .max();
    match cut {
        Some(idx) => &url[..idx],
        None => url,
    }
}

fn record(key: &str, object: &StoredObject) -> ObjectRecord {
    ObjectRecord::new(key, object.data.len() as u64, object.put_time, object.mime.clone())
}

#[async_trait]
impl BucketClient for MemoryStore {
    async fn stat(&self, bucket: &str, key: &str) -> StorageResult<ObjectRecord> {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| record(key, object))
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn list(&self, request: &ListRequest) -> StorageResult<ListPage> {
        let mut state = self.state();
        let call = state.list_calls;
        state.list_calls += 1;
        if state.fail_list_call == Some(call) {
            state.fail_list_call = None;
            return Err(StorageError::store(INJECTED_FAILURE_CODE, "injected listing failure"));
        }

        let Some(objects) = state.buckets.get(&request.bucket) else {
            return Ok(ListPage::default());
        };

        let limit = request.limit.max(1);
        let mut items: Vec<ObjectRecord> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(&request.prefix))
            .filter(|(key, _)| match &request.marker {
                Some(marker) => key.as_str() > marker.as_str(),
                None => true,
            })
            .take(limit + 1)
            .map(|(key, object)| record(key, object))
            .collect();

        let marker = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|r| r.key.clone())
        } else {
            None
        };

        Ok(ListPage { items, marker })
    }

    async fn move_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
        force: bool,
    ) -> StorageResult<()> {
        let mut state = self.state();
        let exists = state
            .buckets
            .get(dest_bucket)
            .is_some_and(|objects| objects.contains_key(dest_key));
        if exists && !force && (src_bucket, src_key) != (dest_bucket, dest_key) {
            return Err(StorageError::store(FILE_EXISTS_CODE, "file exists"));
        }
        let object = state
            .buckets
            .get_mut(src_bucket)
            .and_then(|objects| objects.remove(src_key))
            .ok_or_else(|| StorageError::not_found(src_key))?;
        state
            .buckets
            .entry(dest_bucket.to_string())
            .or_default()
            .insert(dest_key.to_string(), object);
        Ok(())
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
        force: bool,
    ) -> StorageResult<()> {
        let mut state = self.state();
        let exists = state
            .buckets
            .get(dest_bucket)
            .is_some_and(|objects| objects.contains_key(dest_key));
        if exists && !force {
            return Err(StorageError::store(FILE_EXISTS_CODE, "file exists"));
        }
        let object = state
            .buckets
            .get(src_bucket)
            .and_then(|objects| objects.get(src_key))
            .cloned()
            .ok_or_else(|| StorageError::not_found(src_key))?;
        state
            .buckets
            .entry(dest_bucket.to_string())
            .or_default()
            .insert(dest_key.to_string(), object);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.state()
            .buckets
            .get_mut(bucket)
            .and_then(|objects| objects.remove(key))
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn batch_delete(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> StorageResult<Vec<BatchOutcome>> {
        let mut state = self.state();
        let call = state.batch_calls;
        state.batch_calls += 1;
        if state.fail_batch_call == Some(call) {
            state.fail_batch_call = None;
            return Err(StorageError::store(INJECTED_FAILURE_CODE, "injected batch failure"));
        }
        let failing = state.failing_deletes.clone();
        let objects = state.buckets.entry(bucket.to_string()).or_default();

        Ok(keys
            .iter()
            .map(|key| {
                if failing.contains(key) {
                    BatchOutcome::failed(key, INJECTED_FAILURE_CODE, "injected delete failure")
                } else if objects.remove(key).is_some() {
                    BatchOutcome::ok(key)
                } else {
                    BatchOutcome::failed(key, 612, "no such file or directory")
                }
            })
            .collect())
    }
}

#[async_trait]
impl UploadClient for MemoryStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        options: &PutOptions,
    ) -> StorageResult<UploadReceipt> {
        Ok(self.store_object(bucket, key, data, options, false))
    }

    async fn put_resumable(
        &self,
        bucket: &str,
        key: &str,
        mut reader: ByteReader,
        size: u64,
        options: &PutOptions,
    ) -> StorageResult<UploadReceipt> {
        let mut buffer = Vec::with_capacity(size as usize);
        reader.read_to_end(&mut buffer).await?;
        if buffer.len() as u64 != size {
            return Err(StorageError::store(
                400,
                format!("expected {} bytes, read {}", size, buffer.len()),
            ));
        }
        Ok(self.store_object(bucket, key, Bytes::from(buffer), options, true))
    }
}

impl UrlSigner for MemoryStore {
    fn private_download_url(&self, url: &str, expires: Duration) -> StorageResult<String> {
        let deadline = Utc::now().timestamp() + expires.as_secs() as i64;
        let separator = if url.contains('?') { '&' } else { '?' };
        Ok(format!("{}{}e={}&token=memory", url, separator, deadline))
    }

    fn upload_token(
        &self,
        bucket: &str,
        key: Option<&str>,
        expires: Duration,
    ) -> StorageResult<String> {
        let scope = match key {
            Some(key) => format!("{}:{}", bucket, key),
            None => bucket.to_string(),
        };
        Ok(format!("memory:{}:{}", scope, expires.as_secs()))
    }
}

#[async_trait]
impl Downloader for MemoryStore {
    async fn fetch(&self, url: &str) -> StorageResult<Bytes> {
        let (bucket, key) = self.resolve_url(url)?;
        self.get(&bucket, &key)
            .ok_or_else(|| StorageError::not_found(&key))
    }

    async fn fetch_stream(&self, url: &str) -> StorageResult<ByteStream> {
        let data = self.fetch(url).await?;
        let chunks: Vec<StorageResult<Bytes>> = (0..data.len())
            .step_by(STREAM_CHUNK_SIZE)
            .map(|start| Ok(data.slice(start..(start + STREAM_CHUNK_SIZE).min(data.len()))))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

#[async_trait]
impl PersistentFop for MemoryStore {
    async fn execute(&self, request: &PfopRequest) -> StorageResult<String> {
        let mut state = self.state();
        let exists = state
            .buckets
            .get(&request.bucket)
            .is_some_and(|objects| objects.contains_key(&request.key));
        if !exists {
            return Err(StorageError::not_found(&request.key));
        }
        state.jobs.push(request.clone());
        Ok(format!("z0.memory.{}", state.jobs.len()))
    }

    async fn status(&self, id: &str) -> StorageResult<serde_json::Value> {
        let state = self.state();
        let job = id
            .strip_prefix("z0.memory.")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| state.jobs.get(idx))
            .ok_or_else(|| StorageError::store(612, format!("no such persistent id: {}", id)))?;

        Ok(serde_json::json!({
            "id": id,
            "code": 0,
            "desc": "The fop was completed successfully",
            "inputBucket": job.bucket,
            "inputKey": job.key,
            "pipeline": job.pipeline,
            "items": job
                .fops
                .iter()
                .map(|cmd| serde_json::json!({"cmd": cmd, "code": 0}))
                .collect::<Vec<_>>(),
        }))
    }
}

/// Builds memory-backed clients and routes each configured domain to its bucket.
#[derive(Clone, Default)]
pub struct MemoryClientFactory {
    store: MemoryStore,
}

impl MemoryClientFactory {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl ClientFactory for MemoryClientFactory {
    fn build(&self, config: &QiniuConfig) -> StorageResult<QiniuClients> {
        let host = config
            .host()
            .map_err(|e| StorageError::InvalidArgument(e.to_string()))?;
        self.store.register_domain(&host, &config.bucket);
        Ok(self.store.clients())
    }
}
