//! S3 Store Configuration

use objstash_core::{ObjectStoreError, Result};
use serde::Deserialize;

const DEFAULT_COPY_CONCURRENCY: usize = 32;

/// Connection and tuning settings for [`S3ObjectStore`](super::S3ObjectStore).
///
/// Credentials are not part of this config; they come from the AWS default
/// provider chain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Bucket holding every object of the store
    pub bucket: String,
    /// Region override (defaults to the environment)
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services
    pub endpoint: Option<String>,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`
    pub force_path_style: bool,
    /// Upper bound on in-flight object copies during a recursive copy
    pub copy_concurrency: usize,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: None,
            endpoint: None,
            force_path_style: false,
            copy_concurrency: DEFAULT_COPY_CONCURRENCY,
        }
    }
}

impl S3Config {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Point at an S3-compatible endpoint (MinIO, Ceph, ...). Implies
    /// path-style addressing.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self.force_path_style = true;
        self
    }

    pub fn with_copy_concurrency(mut self, copy_concurrency: usize) -> Self {
        self.copy_concurrency = copy_concurrency;
        self
    }

    /// Read settings from `OBJSTASH_S3_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bucket = lookup("OBJSTASH_S3_BUCKET").ok_or_else(|| {
            ObjectStoreError::Configuration("OBJSTASH_S3_BUCKET is not set".to_string())
        })?;
        let mut config = Self::new(bucket);
        config.region = lookup("OBJSTASH_S3_REGION");
        config.endpoint = lookup("OBJSTASH_S3_ENDPOINT");
        if let Some(value) = lookup("OBJSTASH_S3_FORCE_PATH_STYLE") {
            config.force_path_style = parse_env("OBJSTASH_S3_FORCE_PATH_STYLE", &value)?;
        } else if config.endpoint.is_some() {
            config.force_path_style = true;
        }
        if let Some(value) = lookup("OBJSTASH_S3_COPY_CONCURRENCY") {
            config.copy_concurrency = parse_env("OBJSTASH_S3_COPY_CONCURRENCY", &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(ObjectStoreError::Configuration(
                "bucket name must not be empty".to_string(),
            ));
        }
        if self.copy_concurrency == 0 {
            return Err(ObjectStoreError::Configuration(
                "copy_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ObjectStoreError::Configuration(format!("{name} has an invalid value: {value:?}"))
    })
}
