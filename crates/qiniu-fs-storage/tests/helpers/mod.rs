//! Test helpers: a memory-backed adapter plus on-disk fixtures.
//!
//! Run from workspace root: `cargo test -p qiniu-fs-storage`.

#![allow(dead_code)]

use qiniu_fs_storage::{
    create_adapter, ByteReader, MemoryClientFactory, MemoryStore, QiniuAdapter, QiniuConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const BUCKET: &str = "test-bucket";
pub const DOMAIN: &str = "cdn.example.com";

/// Adapter over an in-memory bucket.
pub struct TestBucket {
    pub adapter: Arc<QiniuAdapter>,
    pub store: MemoryStore,
}

impl TestBucket {
    pub fn new() -> Self {
        Self::with_config(QiniuConfig::new("ak", "sk", BUCKET, DOMAIN))
    }

    pub fn with_config(config: QiniuConfig) -> Self {
        qiniu_fs_core::telemetry::init_tracing();
        let factory = MemoryClientFactory::default();
        let adapter = create_adapter(&config, &factory).expect("Failed to create adapter");
        Self {
            adapter,
            store: factory.store().clone(),
        }
    }

    /// Seed objects directly into the bucket.
    pub fn seed(&self, keys: &[&str]) {
        for key in keys {
            self.store.insert(BUCKET, key, key.as_bytes().to_vec(), "text/plain");
        }
    }
}

impl Default for TestBucket {
    fn default() -> Self {
        Self::new()
    }
}

/// Temporary file filled with a repeating byte pattern.
pub struct TestFile {
    pub temp_dir: TempDir,
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

impl TestFile {
    pub fn new(size: usize) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let path = temp_dir.path().join("fixture.bin");
        let contents: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &contents).expect("Failed to write fixture");
        Self {
            temp_dir,
            path,
            contents,
        }
    }

    pub async fn reader(&self) -> ByteReader {
        let file = tokio::fs::File::open(&self.path)
            .await
            .expect("Failed to open fixture");
        Box::pin(file)
    }

    pub fn len(&self) -> u64 {
        self.contents.len() as u64
    }
}
