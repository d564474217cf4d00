use crate::client::{ListRequest, PfopRequest, PutOptions, QiniuClients, MAX_BATCH_OPERATIONS};
use crate::keys::{keep_path, normalize_key, normalize_path};
use crate::listing::{fetch_all_records, list_entries, without_keep};
use crate::thumbnail::{sized_options, Thumbnail, ThumbnailOptions};
use crate::traits::{
    ByteReader, ByteStream, StorageAdapter, StorageError, StorageResult, WriteOptions,
    WriteResult,
};
use crate::url::{build_url, can_thumbnail};
use async_trait::async_trait;
use bytes::Bytes;
use qiniu_fs_core::{ListingEntry, Protocol, QiniuConfig};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;

/// Largest payload sent as a single upload; anything bigger goes resumable.
pub const BLOCK_SIZE: u64 = 4 * 1024 * 1024;

const UPLOAD_TOKEN_EXPIRES: Duration = Duration::from_secs(3600);

/// Qiniu bucket exposed through the [`StorageAdapter`] contract
#[derive(Clone)]
pub struct QiniuAdapter {
    bucket: String,
    /// Host with optional sub-path, no scheme
    domain: String,
    protocol: Protocol,
    private_protocol: Protocol,
    keep_name: String,
    notify_url: Option<String>,
    private_url_expires: Duration,
    thumbnail: Thumbnail,
    clients: QiniuClients,
}

impl std::fmt::Debug for QiniuAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QiniuAdapter")
            .field("bucket", &self.bucket)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl QiniuAdapter {
    /// Create an adapter for the configured bucket.
    ///
    /// Fails with `ConfigError` when the configuration does not validate and
    /// with `InvalidArgument` when the domain has no host.
    pub fn new(config: &QiniuConfig, clients: QiniuClients) -> StorageResult<Self> {
        let domain = config
            .host()
            .map_err(|e| StorageError::InvalidArgument(e.to_string()))?;
        config
            .validate()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(QiniuAdapter {
            bucket: config.bucket.clone(),
            domain,
            protocol: config.public_protocol(),
            private_protocol: config.resolved_private_protocol(),
            keep_name: config.keep_name.clone(),
            notify_url: config.notify_url.clone(),
            private_url_expires: Duration::from_secs(config.private_url_expires_secs),
            thumbnail: Thumbnail::new(config.thumbnail_defaults()),
            clients,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn private_protocol(&self) -> Protocol {
        self.private_protocol
    }

    pub fn keep_name(&self) -> &str {
        &self.keep_name
    }

    pub fn thumbnail(&self) -> &Thumbnail {
        &self.thumbnail
    }

    fn put_options(options: &WriteOptions) -> PutOptions {
        PutOptions {
            mime: options.mime_or_default().to_string(),
            params: options.forwarded_params(),
            check_crc: options.check_crc,
        }
    }

    async fn put_bytes(
        &self,
        key: &str,
        data: Bytes,
        options: &WriteOptions,
    ) -> StorageResult<WriteResult> {
        let size = data.len() as u64;
        let start = Instant::now();

        self.clients
            .upload
            .put(&self.bucket, key, data, &Self::put_options(options))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Qiniu upload failed"
                );
                e
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Qiniu upload successful"
        );

        Ok(WriteResult {
            path: key.to_string(),
        })
    }

    /// Metadata for a single object.
    pub async fn stat(&self, path: &str) -> StorageResult<ListingEntry> {
        let key = normalize_key(path)?;
        let mut record = self.clients.bucket.stat(&self.bucket, &key).await?;
        record.key = key;
        Ok(ListingEntry::file(&record))
    }

    /// Listing that still contains directory placeholder objects.
    pub async fn list_contents_including_keep(
        &self,
        dir: &str,
        recursive: bool,
    ) -> StorageResult<Vec<ListingEntry>> {
        let prefix = normalize_path(dir)?;
        let start = Instant::now();
        let entries =
            list_entries(self.clients.bucket.as_ref(), &self.bucket, &prefix, recursive).await?;

        tracing::debug!(
            bucket = %self.bucket,
            prefix = %prefix,
            recursive = recursive,
            entries = entries.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Listing reconstructed"
        );

        Ok(entries)
    }

    /// Public download URL on the configured protocol.
    pub fn get_url(&self, path: &str) -> StorageResult<String> {
        self.get_url_with_protocol(path, self.protocol)
    }

    pub fn get_url_with_protocol(&self, path: &str, protocol: Protocol) -> StorageResult<String> {
        let key = normalize_key(path)?;
        Ok(build_url(protocol, &self.domain, &key))
    }

    /// Signed download URL on the private protocol.
    pub fn private_download_url(&self, path: &str) -> StorageResult<String> {
        let url = self.get_url_with_protocol(path, self.private_protocol)?;
        self.clients
            .signer
            .private_download_url(&url, self.private_url_expires)
    }

    /// Public URL with an `imageView2` query; `options` override the configured defaults.
    pub fn thumbnail_url(&self, path: &str, options: &ThumbnailOptions) -> StorageResult<String> {
        let url = self.get_url(path)?;
        Ok(self.thumbnail.url(&url, options))
    }

    pub fn private_thumbnail_url(
        &self,
        path: &str,
        options: &ThumbnailOptions,
    ) -> StorageResult<String> {
        let url = self.get_url_with_protocol(path, self.private_protocol)?;
        let url = self.thumbnail.url(&url, options);
        self.clients
            .signer
            .private_download_url(&url, self.private_url_expires)
    }

    /// Thumbnail URL for an explicit mode and size, ignoring configured defaults.
    pub fn thumbnail_url_sized(
        &self,
        path: &str,
        mode: u8,
        width: Option<u32>,
        height: Option<u32>,
    ) -> StorageResult<String> {
        let options = sized_options(mode, width, height)?;
        let url = self.get_url(path)?;
        Ok(Thumbnail::default().url(&url, &options))
    }

    /// Upload token for the bucket, or for a single key when `path` is given.
    pub fn upload_token(&self, path: Option<&str>) -> StorageResult<String> {
        let key = path.map(normalize_key).transpose()?;
        self.clients
            .signer
            .upload_token(&self.bucket, key.as_deref(), UPLOAD_TOKEN_EXPIRES)
    }

    pub fn can_thumbnail(&self, mime: &str) -> bool {
        can_thumbnail(mime)
    }

    /// Submit a persistent processing job and return its id.
    ///
    /// Falls back to the configured notify URL when none is given.
    pub async fn persistent_fop_execute(
        &self,
        path: &str,
        fops: &[String],
        pipeline: Option<&str>,
        notify_url: Option<&str>,
        force: bool,
    ) -> StorageResult<String> {
        let pfop = self.clients.pfop.as_ref().ok_or_else(|| {
            StorageError::ConfigError("Persistent fop client not configured".to_string())
        })?;
        if fops.is_empty() {
            return Err(StorageError::InvalidArgument(
                "At least one fop is required".to_string(),
            ));
        }

        let request = PfopRequest {
            bucket: self.bucket.clone(),
            key: normalize_key(path)?,
            fops: fops.to_vec(),
            pipeline: pipeline.map(String::from),
            notify_url: notify_url
                .map(String::from)
                .or_else(|| self.notify_url.clone()),
            force,
        };

        let id = pfop.execute(&request).await?;
        tracing::info!(
            bucket = %self.bucket,
            key = %request.key,
            persistent_id = %id,
            "Persistent fop submitted"
        );
        Ok(id)
    }

    pub async fn persistent_fop_status(&self, id: &str) -> StorageResult<serde_json::Value> {
        let pfop = self.clients.pfop.as_ref().ok_or_else(|| {
            StorageError::ConfigError("Persistent fop client not configured".to_string())
        })?;
        pfop.status(id).await
    }

    /// Remove only the placeholder of `dir`, if there is one.
    pub async fn delete_dir_keep(&self, dir: &str) -> StorageResult<()> {
        let keep = keep_path(dir, &self.keep_name)?;
        if self.has(&keep).await? {
            self.delete(&keep).await?;
        }
        Ok(())
    }
}

fn unreadable_stream(e: std::io::Error) -> StorageError {
    StorageError::InvalidArgument(format!("Upload stream is not readable: {}", e))
}

#[async_trait]
impl StorageAdapter for QiniuAdapter {
    async fn write(
        &self,
        path: &str,
        contents: Bytes,
        options: &WriteOptions,
    ) -> StorageResult<WriteResult> {
        let key = normalize_key(path)?;
        self.put_bytes(&key, contents, options).await
    }

    async fn write_stream(
        &self,
        path: &str,
        mut reader: ByteReader,
        size: Option<u64>,
        options: &WriteOptions,
    ) -> StorageResult<WriteResult> {
        let key = normalize_key(path)?;

        match size {
            Some(size) if size > BLOCK_SIZE => {
                let start = Instant::now();
                self.clients
                    .upload
                    .put_resumable(&self.bucket, &key, reader, size, &Self::put_options(options))
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            error = %e,
                            bucket = %self.bucket,
                            key = %key,
                            size_bytes = size,
                            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                            "Qiniu resumable upload failed"
                        );
                        e
                    })?;

                tracing::info!(
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Qiniu resumable upload successful"
                );

                Ok(WriteResult { path: key })
            }
            Some(size) => {
                let mut buffer = Vec::with_capacity(size as usize);
                (&mut reader)
                    .take(size)
                    .read_to_end(&mut buffer)
                    .await
                    .map_err(unreadable_stream)?;
                if buffer.len() as u64 != size {
                    return Err(StorageError::InvalidArgument(format!(
                        "Upload stream for {} ended after {} of {} bytes",
                        key,
                        buffer.len(),
                        size
                    )));
                }
                let mut extra = [0u8; 1];
                if reader.read(&mut extra).await.map_err(unreadable_stream)? != 0 {
                    return Err(StorageError::InvalidArgument(format!(
                        "Upload stream for {} is longer than the declared {} bytes",
                        key, size
                    )));
                }
                self.put_bytes(&key, Bytes::from(buffer), options).await
            }
            None => {
                let mut buffer = Vec::new();
                reader
                    .read_to_end(&mut buffer)
                    .await
                    .map_err(unreadable_stream)?;
                self.put_bytes(&key, Bytes::from(buffer), options).await
            }
        }
    }

    async fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        let from = normalize_key(from)?;
        let to = normalize_key(to)?;
        let start = Instant::now();

        self.clients
            .bucket
            .move_object(&self.bucket, &from, &self.bucket, &to, false)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    from_key = %from,
                    to_key = %to,
                    "Qiniu move failed"
                );
                e
            })?;

        tracing::info!(
            bucket = %self.bucket,
            from_key = %from,
            to_key = %to,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Qiniu move successful"
        );
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        let from = normalize_key(from)?;
        let to = normalize_key(to)?;
        let start = Instant::now();

        self.clients
            .bucket
            .copy_object(&self.bucket, &from, &self.bucket, &to, false)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    from_key = %from,
                    to_key = %to,
                    "Qiniu copy failed"
                );
                e
            })?;

        tracing::info!(
            bucket = %self.bucket,
            from_key = %from,
            to_key = %to,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Qiniu copy successful"
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let key = normalize_key(path)?;
        let start = Instant::now();

        self.clients
            .bucket
            .delete(&self.bucket, &key)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Qiniu delete failed"
                );
                e
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Qiniu delete successful"
        );
        Ok(())
    }

    async fn delete_dir(&self, dir: &str) -> StorageResult<()> {
        let dir = normalize_path(dir)?;
        if dir.is_empty() {
            return Err(StorageError::InvalidArgument(
                "Refusing to delete the bucket root".to_string(),
            ));
        }
        let start = Instant::now();

        let keys: Vec<String> =
            fetch_all_records(self.clients.bucket.as_ref(), &self.bucket, &format!("{}/", dir))
                .await?
                .into_iter()
                .map(|record| record.key)
                .collect();

        if keys.is_empty() {
            tracing::debug!(bucket = %self.bucket, dir = %dir, "Nothing to delete");
            return Ok(());
        }

        let mut failed = Vec::new();
        for chunk in keys.chunks(MAX_BATCH_OPERATIONS) {
            let outcomes = match self.clients.bucket.batch_delete(&self.bucket, chunk).await {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        bucket = %self.bucket,
                        dir = %dir,
                        keys = chunk.len(),
                        "Qiniu batch delete request failed"
                    );
                    failed.extend_from_slice(chunk);
                    continue;
                }
            };
            for (i, key) in chunk.iter().enumerate() {
                match outcomes.get(i) {
                    Some(outcome) if outcome.is_ok() => {}
                    _ => failed.push(key.clone()),
                }
            }
        }

        if !failed.is_empty() {
            tracing::error!(
                bucket = %self.bucket,
                dir = %dir,
                failed = failed.len(),
                total = keys.len(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Qiniu batch delete failed"
            );
            return Err(StorageError::BatchDelete {
                failed,
                total: keys.len(),
            });
        }

        tracing::info!(
            bucket = %self.bucket,
            dir = %dir,
            deleted = keys.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Qiniu directory delete successful"
        );
        Ok(())
    }

    async fn create_dir(&self, dir: &str, options: &WriteOptions) -> StorageResult<ListingEntry> {
        let dir = normalize_path(dir)?;
        if dir.is_empty() {
            return Err(StorageError::InvalidArgument(
                "The bucket root always exists".to_string(),
            ));
        }
        let keep = keep_path(&dir, &self.keep_name)?;
        self.put_bytes(&keep, Bytes::new(), options).await?;
        Ok(ListingEntry::dir(&dir))
    }

    async fn has(&self, path: &str) -> StorageResult<bool> {
        let key = normalize_path(path)?;
        if !key.is_empty() {
            match self.clients.bucket.stat(&self.bucket, &key).await {
                Ok(_) => return Ok(true),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        let dir_prefix = if key.is_empty() {
            key
        } else {
            format!("{}/", key)
        };
        let page = self
            .clients
            .bucket
            .list(&ListRequest::new(&self.bucket, dir_prefix).with_limit(1))
            .await?;
        Ok(!page.items.is_empty())
    }

    async fn read(&self, path: &str) -> StorageResult<Bytes> {
        let key = normalize_key(path)?;
        let url = self.private_download_url(&key)?;
        let start = Instant::now();

        let bytes = self.clients.downloader.fetch(&url).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Qiniu download failed"
            );
            e
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = bytes.len() as u64,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Qiniu download successful"
        );
        Ok(bytes)
    }

    async fn read_stream(&self, path: &str) -> StorageResult<ByteStream> {
        let url = self.private_download_url(path)?;
        self.clients.downloader.fetch_stream(&url).await
    }

    async fn list_contents(&self, dir: &str, recursive: bool) -> StorageResult<Vec<ListingEntry>> {
        let entries = self.list_contents_including_keep(dir, recursive).await?;
        Ok(without_keep(entries, &self.keep_name))
    }

    async fn get_metadata(&self, path: &str) -> StorageResult<ListingEntry> {
        self.stat(path).await
    }
}
