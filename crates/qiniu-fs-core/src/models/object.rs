//! Object record model: one real object as reported by the bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a stored object, as returned by stat and list calls.
///
/// Field names follow the store's JSON so records can be decoded straight from
/// its responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub key: String,
    #[serde(rename = "fsize")]
    pub size: u64,
    /// Upload time in units of 100 nanoseconds since the Unix epoch
    #[serde(rename = "putTime")]
    pub put_time: i64,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl ObjectRecord {
    pub fn new(
        key: impl Into<String>,
        size: u64,
        put_time: i64,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            size,
            put_time,
            mime_type: mime_type.into(),
            hash: None,
        }
    }

    /// Upload time converted from the store's 100ns ticks.
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        let secs = self.put_time.div_euclid(10_000_000);
        let nanos = (self.put_time.rem_euclid(10_000_000) * 100) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}
