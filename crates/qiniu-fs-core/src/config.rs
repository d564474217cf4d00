use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;

use crate::storage_types::{normalize_domain, Protocol};

const DEFAULT_KEEP_NAME: &str = ".keep";
const DEFAULT_PRIVATE_URL_EXPIRES_SECS: u64 = 3600;
const DEFAULT_CACHE_PREFIX: &str = "filesystem_qiniu";

fn default_keep_name() -> String {
    DEFAULT_KEEP_NAME.to_string()
}

fn default_private_url_expires_secs() -> u64 {
    DEFAULT_PRIVATE_URL_EXPIRES_SECS
}

/// Default `imageView2` parameters applied to every thumbnail URL.
///
/// Per-call options override these field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interlace: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<u32>,
    #[serde(
        default,
        rename = "ignoreError",
        alias = "ignore_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub ignore_error: Option<bool>,
}

impl ThumbnailConfig {
    /// Options from `other` win wherever they are set.
    pub fn merged_with(&self, other: &ThumbnailConfig) -> ThumbnailConfig {
        ThumbnailConfig {
            mode: other.mode.or(self.mode),
            width: other.width.or(self.width),
            height: other.height.or(self.height),
            format: other.format.clone().or_else(|| self.format.clone()),
            interlace: other.interlace.or(self.interlace),
            quality: other.quality.or(self.quality),
            colors: other.colors.or(self.colors),
            ignore_error: other.ignore_error.or(self.ignore_error),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ThumbnailConfig::default()
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(mode) = self.mode {
            if mode > 5 {
                return Err(anyhow::anyhow!(
                    "Thumbnail mode must be between 0 and 5, got {}",
                    mode
                ));
            }
        }
        if let Some(quality) = self.quality {
            if !(1..=100).contains(&quality) {
                return Err(anyhow::anyhow!(
                    "Thumbnail quality must be between 1 and 100, got {}",
                    quality
                ));
            }
        }
        Ok(())
    }
}

/// Listing cache options, consumed by whatever caching layer wraps the adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Named cache store; `None` means an in-process store
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,
    /// Entry lifetime in seconds; `None` keeps entries until evicted
    #[serde(default)]
    pub expire: Option<u64>,
}

fn default_cache_prefix() -> String {
    DEFAULT_CACHE_PREFIX.to_string()
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            store: None,
            prefix: default_cache_prefix(),
            expire: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheSetting {
    Enabled(bool),
    Options(CacheOptions),
}

/// Settings for a single bucket adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QiniuConfig {
    #[serde(alias = "access_key")]
    pub key: String,
    #[serde(alias = "secret_key")]
    pub secret: String,
    pub bucket: String,
    /// Download domain, optionally with scheme and sub-path
    pub domain: String,
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub private_protocol: Option<Protocol>,
    #[serde(default)]
    pub notify_url: Option<String>,
    #[serde(default = "default_keep_name")]
    pub keep_name: String,
    #[serde(default = "default_private_url_expires_secs")]
    pub private_url_expires_secs: u64,
    #[serde(default)]
    pub thumbnail: Option<ThumbnailConfig>,
    #[serde(default)]
    pub cache: Option<CacheSetting>,
}

impl QiniuConfig {
    pub fn new(
        key: impl Into<String>,
        secret: impl Into<String>,
        bucket: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            bucket: bucket.into(),
            domain: domain.into(),
            protocol: None,
            private_protocol: None,
            notify_url: None,
            keep_name: default_keep_name(),
            private_url_expires_secs: DEFAULT_PRIVATE_URL_EXPIRES_SECS,
            thumbnail: None,
            cache: None,
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let key = env::var("QINIU_ACCESS_KEY")
            .map_err(|_| anyhow::anyhow!("QINIU_ACCESS_KEY must be set"))?;
        let secret = env::var("QINIU_SECRET_KEY")
            .map_err(|_| anyhow::anyhow!("QINIU_SECRET_KEY must be set"))?;
        let bucket =
            env::var("QINIU_BUCKET").map_err(|_| anyhow::anyhow!("QINIU_BUCKET must be set"))?;
        let domain =
            env::var("QINIU_DOMAIN").map_err(|_| anyhow::anyhow!("QINIU_DOMAIN must be set"))?;

        let protocol = env::var("QINIU_PROTOCOL")
            .ok()
            .map(|v| v.parse::<Protocol>())
            .transpose()?;
        let private_protocol = env::var("QINIU_PRIVATE_PROTOCOL")
            .ok()
            .map(|v| v.parse::<Protocol>())
            .transpose()?;
        let notify_url = env::var("QINIU_NOTIFY_URL").ok().filter(|v| !v.is_empty());
        let keep_name = env::var("QINIU_KEEP_NAME").unwrap_or_else(|_| default_keep_name());
        let private_url_expires_secs = env::var("QINIU_PRIVATE_URL_EXPIRES_SECS")
            .unwrap_or_else(|_| DEFAULT_PRIVATE_URL_EXPIRES_SECS.to_string())
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("Invalid QINIU_PRIVATE_URL_EXPIRES_SECS: {}", e))?;

        let thumbnail = ThumbnailConfig {
            mode: parse_optional_env("QINIU_THUMBNAIL_MODE")?,
            width: parse_optional_env("QINIU_THUMBNAIL_WIDTH")?,
            height: parse_optional_env("QINIU_THUMBNAIL_HEIGHT")?,
            ..Default::default()
        };

        let config = Self {
            key,
            secret,
            bucket,
            domain,
            protocol,
            private_protocol,
            notify_url,
            keep_name,
            private_url_expires_secs,
            thumbnail: (!thumbnail.is_empty()).then_some(thumbnail),
            cache: None,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.key.is_empty() {
            return Err(anyhow::anyhow!("Access key cannot be empty"));
        }
        if self.secret.is_empty() {
            return Err(anyhow::anyhow!("Secret key cannot be empty"));
        }
        if self.bucket.is_empty() {
            return Err(anyhow::anyhow!("Bucket cannot be empty"));
        }
        if self.domain.is_empty() {
            return Err(anyhow::anyhow!("Domain cannot be empty"));
        }
        if matches!(self.keep_name.as_str(), "" | "." | "..")
            || self.keep_name.contains(['/', '\\'])
        {
            return Err(anyhow::anyhow!(
                "Keep name must be a single path segment, got {:?}",
                self.keep_name
            ));
        }
        normalize_domain(&self.domain)?;
        if let Some(thumbnail) = &self.thumbnail {
            thumbnail.validate()?;
        }
        Ok(())
    }

    /// Host and optional sub-path of the download domain, without scheme.
    pub fn host(&self) -> Result<String, anyhow::Error> {
        normalize_domain(&self.domain).map(|(host, _)| host)
    }

    /// Configured protocol, else the scheme in the domain, else http.
    pub fn public_protocol(&self) -> Protocol {
        if let Some(protocol) = self.protocol {
            return protocol;
        }
        normalize_domain(&self.domain)
            .ok()
            .and_then(|(_, scheme)| scheme)
            .unwrap_or_default()
    }

    pub fn resolved_private_protocol(&self) -> Protocol {
        self.private_protocol
            .unwrap_or_else(|| self.public_protocol())
    }

    pub fn thumbnail_defaults(&self) -> ThumbnailConfig {
        self.thumbnail.clone().unwrap_or_default()
    }

    /// `true` selects default cache options, `false` or absent disables caching.
    pub fn cache_settings(&self) -> Option<CacheOptions> {
        match &self.cache {
            None | Some(CacheSetting::Enabled(false)) => None,
            Some(CacheSetting::Enabled(true)) => Some(CacheOptions::default()),
            Some(CacheSetting::Options(options)) => Some(options.clone()),
        }
    }
}

fn parse_optional_env<T>(name: &str) -> Result<Option<T>, anyhow::Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", name, e)),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketConfig {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub private_protocol: Option<Protocol>,
}

/// Credential set and the buckets it may access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskConfig {
    pub access_key: String,
    pub secret_key: String,
    /// Bucket used when none is requested
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub buckets: BTreeMap<String, BucketConfig>,
}

/// Multi-disk registry configuration, read from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub default: String,
    pub disks: BTreeMap<String, DiskConfig>,
}

impl ManagerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, anyhow::Error> {
        let config: ManagerConfig = serde_json::from_str(json)
            .map_err(|e| anyhow::anyhow!("Invalid manager configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.disks.contains_key(&self.default) {
            return Err(anyhow::anyhow!(
                "Default disk [{}] is not configured",
                self.default
            ));
        }
        for (name, disk) in &self.disks {
            if disk.access_key.is_empty() || disk.secret_key.is_empty() {
                return Err(anyhow::anyhow!("Disk [{}] is missing credentials", name));
            }
            if let Some(default) = &disk.default {
                if !disk.buckets.contains_key(default) {
                    return Err(anyhow::anyhow!(
                        "Default bucket [{}] is not declared on disk [{}]",
                        default,
                        name
                    ));
                }
            }
        }
        Ok(())
    }

    /// Adapter configuration for one declared bucket of a disk.
    pub fn bucket_config(&self, disk: &str, bucket: &str) -> Result<QiniuConfig, anyhow::Error> {
        let disk_config = self
            .disks
            .get(disk)
            .ok_or_else(|| anyhow::anyhow!("Disk [{}] is not configured", disk))?;
        let bucket_config = disk_config.buckets.get(bucket).ok_or_else(|| {
            anyhow::anyhow!("Bucket [{}] in disk [{}] is not supported", bucket, disk)
        })?;

        let domain = bucket_config
            .domain
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Bucket [{}] has no domain", bucket))?;

        let mut config = QiniuConfig::new(
            disk_config.access_key.clone(),
            disk_config.secret_key.clone(),
            bucket,
            domain,
        );
        config.protocol = bucket_config.protocol;
        config.private_protocol = bucket_config.private_protocol;
        Ok(config)
    }
}
