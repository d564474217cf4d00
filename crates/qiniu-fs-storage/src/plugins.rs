//! Listing helpers available on every [`StorageAdapter`].

use crate::traits::{StorageAdapter, StorageResult};
use async_trait::async_trait;
use qiniu_fs_core::ListingEntry;

#[async_trait]
pub trait ListingExt: StorageAdapter {
    /// Files whose mimetype starts with `image`.
    async fn list_images(&self, dir: &str, recursive: bool) -> StorageResult<Vec<ListingEntry>> {
        let entries = self.list_contents(dir, recursive).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| {
                entry.is_file()
                    && entry
                        .mimetype
                        .as_deref()
                        .is_some_and(|mime| mime.starts_with("image"))
            })
            .collect())
    }

    /// Files with the given extension, compared case-insensitively.
    async fn list_by_extension(
        &self,
        dir: &str,
        extension: &str,
        recursive: bool,
    ) -> StorageResult<Vec<ListingEntry>> {
        let wanted = extension.trim_start_matches('.');
        let entries = self.list_contents(dir, recursive).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| {
                entry.is_file()
                    && entry
                        .extension
                        .as_deref()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
            })
            .collect())
    }
}

impl<T: StorageAdapter + ?Sized> ListingExt for T {}
