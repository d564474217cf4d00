//! Qiniu FS Storage Library
//!
//! This crate exposes a Qiniu bucket through a filesystem-style storage
//! contract. Vendor operations (uploads, signing, batch requests) are supplied
//! by collaborator implementations injected at construction; the crate itself
//! normalizes paths, reconstructs directory listings from flat keys and builds
//! download and thumbnail URLs.
//!
//! # Directories
//!
//! The store has no native directories. A directory exists while any object
//! lives below it, or while its placeholder object (`<dir>/.keep` by default)
//! exists. Placeholders are hidden from [`StorageAdapter::list_contents`] and
//! removed by [`StorageAdapter::delete_dir`].

pub mod client;
pub mod factory;
#[cfg(feature = "http")]
pub mod http;
pub mod keys;
pub mod listing;
pub mod manager;
#[cfg(feature = "memory")]
pub mod memory;
pub mod plugins;
pub mod qiniu;
pub mod thumbnail;
pub mod traits;
pub mod url;

// Re-export commonly used types
pub use client::{
    BatchOutcome, BucketClient, Downloader, ListPage, ListRequest, PersistentFop, PfopRequest,
    PutOptions, QiniuClients, UploadClient, UploadReceipt, UrlSigner,
};
pub use factory::{create_adapter, create_adapter_from_env, create_storage, ClientFactory};
#[cfg(feature = "http")]
pub use http::HttpFetcher;
pub use manager::Manager;
#[cfg(feature = "memory")]
pub use memory::{MemoryClientFactory, MemoryStore};
pub use plugins::ListingExt;
pub use qiniu::{QiniuAdapter, BLOCK_SIZE};
pub use qiniu_fs_core::{EntryKind, ListingEntry, ObjectRecord, Protocol, QiniuConfig, Visibility};
pub use thumbnail::{Thumbnail, ThumbnailOptions};
pub use traits::{
    ByteReader, ByteStream, StorageAdapter, StorageError, StorageResult, WriteOptions, WriteResult,
};
