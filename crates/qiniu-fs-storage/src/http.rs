//! HTTP downloader for (signed) object URLs.

use crate::client::Downloader;
use crate::traits::{ByteStream, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &str) -> StorageResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::not_found(url));
        }
        if !status.is_success() {
            return Err(StorageError::store(
                status.as_u16(),
                status.canonical_reason().unwrap_or("download failed"),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl Downloader for HttpFetcher {
    async fn fetch(&self, url: &str) -> StorageResult<Bytes> {
        self.get(url)
            .await?
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))
    }

    async fn fetch_stream(&self, url: &str) -> StorageResult<ByteStream> {
        let response = self.get(url).await?;
        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| {
                tracing::error!(error = %e, "Stream download error");
                StorageError::DownloadFailed(e.to_string())
            })
        });
        Ok(Box::pin(stream))
    }
}
