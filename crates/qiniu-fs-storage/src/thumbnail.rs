//! `imageView2` thumbnail query builder
//!
//! Builds the vendor's slash-delimited processing query, for example
//! `imageView2/2/w/30/h/120`, and appends it to a download URL.
//!
//! # Example
//!
//! ```rust
//! use qiniu_fs_storage::thumbnail::{Thumbnail, ThumbnailOptions};
//!
//! let thumbnail = Thumbnail::default();
//! let options = ThumbnailOptions {
//!     mode: Some(2),
//!     width: Some(30),
//!     height: Some(120),
//!     ..Default::default()
//! };
//! assert_eq!(
//!     thumbnail.url("testing?a", &options),
//!     "testing?a&imageView2/2/w/30/h/120"
//! );
//! ```

use crate::traits::{StorageError, StorageResult};
use crate::url::append_query;

pub use qiniu_fs_core::ThumbnailConfig as ThumbnailOptions;

const VIEW: &str = "imageView2";
const MAX_MODE: u8 = 5;

/// Thumbnail builder holding the configured default options
#[derive(Debug, Clone, Default)]
pub struct Thumbnail {
    defaults: ThumbnailOptions,
}

impl Thumbnail {
    pub fn new(defaults: ThumbnailOptions) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &ThumbnailOptions {
        &self.defaults
    }

    /// Query for the defaults overridden by `options`.
    pub fn query(&self, options: &ThumbnailOptions) -> String {
        build_query(&self.defaults.merged_with(options))
    }

    pub fn url(&self, url: &str, options: &ThumbnailOptions) -> String {
        append_query(url, &self.query(options))
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Render options in their fixed order, skipping anything unset.
pub fn build_query(options: &ThumbnailOptions) -> String {
    let mut query = format!("{}/{}", VIEW, options.mode.unwrap_or(0));

    let mut push = |key: &str, value: String| {
        query.push('/');
        query.push_str(key);
        query.push('/');
        query.push_str(&value);
    };

    if let Some(width) = options.width {
        push("w", width.to_string());
    }
    if let Some(height) = options.height {
        push("h", height.to_string());
    }
    if let Some(format) = options.format.as_deref().filter(|f| !f.is_empty()) {
        push("format", format.to_string());
    }
    if let Some(interlace) = options.interlace {
        push("interlace", flag(interlace).to_string());
    }
    if let Some(quality) = options.quality {
        push("q", quality.to_string());
    }
    if let Some(colors) = options.colors {
        push("colors", colors.to_string());
    }
    if let Some(ignore_error) = options.ignore_error {
        push("ignore-error", flag(ignore_error).to_string());
    }

    query
}

/// Options for a sized thumbnail, checked the way callers expect.
///
/// `mode` must be `0..=5` and at least one dimension must be given.
pub fn sized_options(
    mode: u8,
    width: Option<u32>,
    height: Option<u32>,
) -> StorageResult<ThumbnailOptions> {
    if mode > MAX_MODE || (width.is_none() && height.is_none()) {
        return Err(StorageError::InvalidArgument(format!(
            "Wrong thumbnail mode {} or size {:?}x{:?}",
            mode, width, height
        )));
    }

    Ok(ThumbnailOptions {
        mode: Some(mode),
        width,
        height,
        ..Default::default()
    })
}
