//! Cache configuration.
//!
//! The local cache directory is resolved with the following precedence:
//!
//! 1. An explicit [`CacheConfig::with_cache_root`] value
//! 2. The `MODEL_CACHE_DIR` environment variable
//! 3. The default `./model_cache`
//!
//! The directory is created when resolved. The remote key prefix is
//! normalized to a single trailing separator at construction.

use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};
use crate::keys::normalize_prefix;

/// Default remote key prefix.
pub const DEFAULT_PREFIX: &str = "models/";

/// Default local cache directory.
pub const DEFAULT_CACHE_ROOT: &str = "./model_cache";

/// Environment variable overriding the local cache directory.
pub const CACHE_DIR_ENV: &str = "MODEL_CACHE_DIR";

/// Default object store region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default multipart chunk size (and the threshold above which uploads
/// switch to the chunked path).
pub const DEFAULT_MULTIPART_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

/// Configuration for a [`ModelCache`](crate::ModelCache) instance.
///
/// Bucket, endpoint and credentials are mandatory; everything else has a
/// default. The remote layout mode (`store_as_archive`) is fixed for the
/// lifetime of the instance it configures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Object store bucket name.
    pub bucket: String,
    /// Object store endpoint URL (e.g. `https://s3.example.com`).
    pub endpoint: String,
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Region name.
    pub region: String,
    /// Remote key prefix; always ends in a single separator.
    pub prefix: String,
    /// Local cache directory; `None` falls back to `MODEL_CACHE_DIR`,
    /// then [`DEFAULT_CACHE_ROOT`].
    pub cache_root: Option<PathBuf>,
    /// `true`: one `.tar.gz` object per model. `false`: one object per
    /// file under a model-specific prefix.
    pub store_as_archive: bool,
    /// Verify TLS certificates when talking to the endpoint.
    pub verify_tls: bool,
    /// Custom root CA bundle for the endpoint connection.
    pub ca_bundle: Option<PathBuf>,
    /// Chunk size for multipart uploads; files at or above this size are
    /// uploaded in concurrent parts.
    pub multipart_chunk_size: u64,
}

impl CacheConfig {
    /// Create a configuration with the mandatory connection identity and
    /// defaults for everything else.
    pub fn new(
        bucket: impl Into<String>,
        endpoint: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            endpoint: endpoint.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: DEFAULT_REGION.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            cache_root: None,
            store_as_archive: true,
            verify_tls: true,
            ca_bundle: None,
            multipart_chunk_size: DEFAULT_MULTIPART_CHUNK_SIZE,
        }
    }

    /// Set the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set the remote key prefix (normalized to a trailing separator).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = normalize_prefix(&prefix.into());
        self
    }

    /// Set the local cache directory explicitly.
    pub fn with_cache_root(mut self, cache_root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(cache_root.into());
        self
    }

    /// Select archive mode (`true`) or directory mode (`false`).
    pub fn with_store_as_archive(mut self, store_as_archive: bool) -> Self {
        self.store_as_archive = store_as_archive;
        self
    }

    /// Enable or disable TLS certificate verification.
    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    /// Use a custom root CA bundle for the endpoint connection.
    pub fn with_ca_bundle(mut self, ca_bundle: impl Into<PathBuf>) -> Self {
        self.ca_bundle = Some(ca_bundle.into());
        self
    }

    /// Set the multipart chunk size.
    pub fn with_multipart_chunk_size(mut self, chunk_size: u64) -> Self {
        self.multipart_chunk_size = chunk_size;
        self
    }

    /// Reject missing mandatory settings before any I/O is attempted.
    pub fn validate(&self) -> CacheResult<()> {
        let mandatory = [
            ("bucket", &self.bucket),
            ("endpoint", &self.endpoint),
            ("access key id", &self.access_key_id),
            ("secret access key", &self.secret_access_key),
        ];
        for (name, value) in mandatory {
            if value.trim().is_empty() {
                return Err(CacheError::Config(format!("missing mandatory setting: {name}")));
            }
        }
        if self.multipart_chunk_size == 0 {
            return Err(CacheError::Config(
                "multipart chunk size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the local cache root (see module docs for precedence) and
    /// create it if absent.
    pub fn resolve_cache_root(&self) -> io::Result<PathBuf> {
        let root = match &self.cache_root {
            Some(path) => path.clone(),
            None => env::var_os(CACHE_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_ROOT)),
        };
        fs::create_dir_all(&root)?;
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config() -> CacheConfig {
        CacheConfig::new("bucket", "https://s3.example.com", "key", "secret")
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.prefix, "models/");
        assert!(config.store_as_archive);
        assert!(config.verify_tls);
        assert_eq!(config.multipart_chunk_size, 100 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_missing_settings() {
        assert!(config().validate().is_ok());

        let missing = CacheConfig::new("", "https://s3.example.com", "key", "secret");
        let err = missing.validate().unwrap_err();
        assert!(err.to_string().contains("bucket"));

        let zero_chunk = config().with_multipart_chunk_size(0);
        assert!(zero_chunk.validate().is_err());
    }

    #[test]
    fn test_prefix_is_normalized() {
        assert_eq!(config().with_prefix("artifacts").prefix, "artifacts/");
        assert_eq!(config().with_prefix("artifacts///").prefix, "artifacts/");
    }

    #[test]
    fn test_resolve_cache_root_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("nested").join("cache");
        let config = config().with_cache_root(&root);

        let resolved = config.resolve_cache_root().unwrap();
        assert_eq!(resolved, root);
        assert!(root.is_dir());
    }
}
