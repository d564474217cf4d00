use crate::client::QiniuClients;
use crate::{QiniuAdapter, StorageAdapter, StorageError, StorageResult};
use qiniu_fs_core::QiniuConfig;
use std::sync::Arc;

/// Builds the vendor collaborators for one bucket configuration.
///
/// Applications implement this on top of the vendor SDK; the memory backend
/// provides one for tests.
pub trait ClientFactory: Send + Sync {
    fn build(&self, config: &QiniuConfig) -> StorageResult<QiniuClients>;
}

/// Create an adapter for `config` with clients from `factory`.
pub fn create_adapter(
    config: &QiniuConfig,
    factory: &dyn ClientFactory,
) -> StorageResult<Arc<QiniuAdapter>> {
    config
        .validate()
        .map_err(|e| StorageError::ConfigError(e.to_string()))?;
    let clients = factory.build(config)?;
    let adapter = QiniuAdapter::new(config, clients)?;

    tracing::info!(
        bucket = %adapter.bucket(),
        domain = %adapter.domain(),
        protocol = %adapter.protocol(),
        "Qiniu adapter created"
    );

    Ok(Arc::new(adapter))
}

/// Same as [`create_adapter`], erased to the storage contract.
pub fn create_storage(
    config: &QiniuConfig,
    factory: &dyn ClientFactory,
) -> StorageResult<Arc<dyn StorageAdapter>> {
    let adapter: Arc<dyn StorageAdapter> = create_adapter(config, factory)?;
    Ok(adapter)
}

/// Create an adapter from `QINIU_*` environment variables.
pub fn create_adapter_from_env(factory: &dyn ClientFactory) -> StorageResult<Arc<QiniuAdapter>> {
    let config = QiniuConfig::from_env().map_err(|e| StorageError::ConfigError(e.to_string()))?;
    create_adapter(&config, factory)
}

/// Create a memory-backed adapter for testing
#[cfg(all(test, feature = "memory"))]
pub fn create_test_adapter() -> StorageResult<(Arc<QiniuAdapter>, crate::MemoryStore)> {
    let factory = crate::MemoryClientFactory::default();
    let config = QiniuConfig::new("test-ak", "test-sk", "test-bucket", "http://cdn.test.local");
    let adapter = create_adapter(&config, &factory)?;
    Ok((adapter, factory.store().clone()))
}
