//! Registry of credential sets ("disks") and the buckets each may open.

use crate::factory::{create_adapter, ClientFactory};
use crate::{QiniuAdapter, StorageError, StorageResult};
use qiniu_fs_core::ManagerConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Resolves `(disk, bucket)` pairs to adapters, building each one once.
pub struct Manager {
    config: ManagerConfig,
    factory: Arc<dyn ClientFactory>,
    adapters: Mutex<HashMap<(String, String), Arc<QiniuAdapter>>>,
}

impl Manager {
    pub fn new(config: ManagerConfig, factory: Arc<dyn ClientFactory>) -> StorageResult<Self> {
        config
            .validate()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;
        Ok(Self {
            config,
            factory,
            adapters: Mutex::new(HashMap::new()),
        })
    }

    pub fn default_disk(&self) -> &str {
        &self.config.default
    }

    /// Default bucket of a disk.
    pub fn default_bucket(&self, disk: &str) -> StorageResult<&str> {
        let disk_config = self.config.disks.get(disk).ok_or_else(|| {
            StorageError::InvalidArgument(format!("Disk [{}] is not configured", disk))
        })?;
        disk_config.default.as_deref().ok_or_else(|| {
            StorageError::InvalidArgument(format!("Default bucket not found in disk [{}]", disk))
        })
    }

    /// Adapter for `bucket` on `disk`; `None` selects the configured defaults.
    pub async fn get(
        &self,
        disk: Option<&str>,
        bucket: Option<&str>,
    ) -> StorageResult<Arc<QiniuAdapter>> {
        let disk = disk.unwrap_or(self.default_disk()).to_string();
        let bucket = match bucket {
            Some(bucket) => bucket.to_string(),
            None => self.default_bucket(&disk)?.to_string(),
        };

        let mut adapters = self.adapters.lock().await;
        if let Some(adapter) = adapters.get(&(disk.clone(), bucket.clone())) {
            return Ok(adapter.clone());
        }

        let config = self
            .config
            .bucket_config(&disk, &bucket)
            .map_err(|e| StorageError::InvalidArgument(e.to_string()))?;
        let adapter = create_adapter(&config, self.factory.as_ref())?;

        tracing::debug!(disk = %disk, bucket = %bucket, "Resolved bucket adapter");
        adapters.insert((disk, bucket), adapter.clone());
        Ok(adapter)
    }
}
