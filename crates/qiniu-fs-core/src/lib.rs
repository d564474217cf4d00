//! Qiniu FS Core Library
//!
//! This crate provides the domain models, protocol handling, configuration and
//! tracing setup shared by the Qiniu filesystem adapter crates.

pub mod config;
pub mod models;
pub mod storage_types;
pub mod telemetry;

// Re-export commonly used types
pub use config::{
    BucketConfig, CacheOptions, CacheSetting, DiskConfig, ManagerConfig, QiniuConfig,
    ThumbnailConfig,
};
pub use models::{EntryKind, ListingEntry, ObjectRecord, Visibility};
pub use storage_types::{normalize_domain, Protocol};
// Note: StorageAdapter, StorageError, StorageResult live in qiniu-fs-storage
