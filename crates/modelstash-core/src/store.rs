//! Object store gateway - synchronous facade over an S3-compatible store.
//!
//! Wraps an [`ObjectStore`] implementation behind blocking operations so
//! the coordinator stays synchronous; a small owned tokio runtime drives
//! the transfers. Puts and gets stream their bodies, so memory stays
//! bounded regardless of object size, and puts switch to the multipart
//! path once a file reaches the configured chunk size.
//!
//! "Not found" is a normal `false`/no-op, never an error. Listing is
//! paginated transparently by the underlying client; a failure mid-listing
//! surfaces as an error and the caller restarts from scratch.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use log::{debug, error};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore, PutPayload};
use thiserror::Error;
use tokio::runtime::Runtime;

use crate::config::CacheConfig;

/// Error type for gateway operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid object store configuration: {0}")]
    Config(String),
    #[error("object store request failed: {0}")]
    Request(#[from] object_store::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gateway operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Synchronous view of a remote object store.
pub struct ObjectStoreGateway {
    store: Arc<dyn ObjectStore>,
    runtime: Runtime,
    multipart_chunk_size: u64,
}

impl ObjectStoreGateway {
    /// Connect to the S3-compatible endpoint described by `config` and
    /// probe it once, so misconfiguration fails here rather than on the
    /// first transfer.
    pub fn connect(config: &CacheConfig) -> StoreResult<Self> {
        if let Some(ca_bundle) = &config.ca_bundle {
            // The HTTP client loads native trust roots from this variable;
            // certificate plumbing beyond that is the deployment's concern.
            std::env::set_var("SSL_CERT_FILE", ca_bundle);
        }

        let mut client_options = ClientOptions::new();
        if !config.verify_tls {
            client_options = client_options.with_allow_invalid_certificates(true);
        }

        let store = AmazonS3Builder::new()
            .with_bucket_name(config.bucket.clone())
            .with_endpoint(config.endpoint.clone())
            .with_region(config.region.clone())
            .with_access_key_id(config.access_key_id.clone())
            .with_secret_access_key(config.secret_access_key.clone())
            .with_virtual_hosted_style_request(false)
            .with_allow_http(config.endpoint.starts_with("http://"))
            .with_client_options(client_options)
            .build()?;

        let gateway = Self::with_store(Arc::new(store), config.multipart_chunk_size)?;
        gateway.probe(&config.prefix)?;
        debug!(
            "object store reachable: bucket={} endpoint={}",
            config.bucket, config.endpoint
        );
        Ok(gateway)
    }

    /// Wrap an existing store implementation (any [`ObjectStore`]: S3,
    /// local filesystem, in-memory). No reachability probe is performed.
    pub fn with_store(store: Arc<dyn ObjectStore>, multipart_chunk_size: u64) -> StoreResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("modelstash-io")
            .enable_all()
            .build()?;
        Ok(Self {
            store,
            runtime,
            multipart_chunk_size,
        })
    }

    /// One cheap listing round-trip against the bucket.
    pub fn probe(&self, prefix: &str) -> StoreResult<()> {
        let prefix = object_prefix(prefix);
        self.runtime.block_on(async {
            let mut listing = self.store.list(prefix.as_ref());
            match listing.try_next().await {
                Ok(_) => Ok(()),
                Err(err) => {
                    error!("object store probe failed: {err}");
                    Err(err.into())
                }
            }
        })
    }

    /// Does an object exist at `key`?
    pub fn exists(&self, key: &str) -> StoreResult<bool> {
        let location = ObjectPath::from(key);
        self.runtime.block_on(async {
            match self.store.head(&location).await {
                Ok(_) => Ok(true),
                Err(object_store::Error::NotFound { .. }) => Ok(false),
                Err(err) => Err(err.into()),
            }
        })
    }

    /// Upload a local file to `key`, switching to chunked multipart
    /// transfer at the configured size threshold.
    pub fn put_file(&self, local_file: &Path, key: &str) -> StoreResult<()> {
        let size = fs::metadata(local_file)?.len();
        if size >= self.multipart_chunk_size {
            return self.put_file_chunked(local_file, key, self.multipart_chunk_size);
        }

        let location = ObjectPath::from(key);
        let payload = PutPayload::from(fs::read(local_file)?);
        self.runtime.block_on(async {
            self.store.put(&location, payload).await?;
            Ok(())
        })
    }

    /// Download the object at `key` to a local file, streaming the body.
    /// Parent directories of `local_file` are created as needed.
    pub fn get_file(&self, key: &str, local_file: &Path) -> StoreResult<()> {
        if let Some(parent) = local_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let location = ObjectPath::from(key);
        self.runtime.block_on(async {
            let response = self.store.get(&location).await?;
            let mut body = response.into_stream();
            let mut writer = BufWriter::new(File::create(local_file)?);
            while let Some(chunk) = body.try_next().await? {
                writer.write_all(&chunk)?;
            }
            writer.flush()?;
            Ok(())
        })
    }

    /// Is there at least one object under `prefix`?
    pub fn exists_under_prefix(&self, prefix: &str) -> StoreResult<bool> {
        let prefix = object_prefix(prefix);
        self.runtime.block_on(async {
            let mut listing = self.store.list(prefix.as_ref());
            Ok(listing.try_next().await?.is_some())
        })
    }

    /// All object keys under `prefix`. Pagination is transparent; the
    /// result is a finite snapshot, not restartable across failures.
    pub fn list_under_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let prefix = object_prefix(prefix);
        self.runtime.block_on(async {
            let keys = self
                .store
                .list(prefix.as_ref())
                .map_ok(|meta| meta.location.to_string())
                .try_collect::<Vec<_>>()
                .await?;
            Ok(keys)
        })
    }

    /// Delete a single object. Deleting an absent key is a no-op.
    pub fn delete_object(&self, key: &str) -> StoreResult<()> {
        let location = ObjectPath::from(key);
        self.runtime.block_on(async {
            match self.store.delete(&location).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
                Err(err) => Err(err.into()),
            }
        })
    }

    /// Delete every object under `prefix`; returns how many were removed.
    /// An empty prefix set is a no-op, not a failure.
    pub fn delete_under_prefix(&self, prefix: &str) -> StoreResult<usize> {
        let prefix = object_prefix(prefix);
        self.runtime.block_on(async {
            let locations = self
                .store
                .list(prefix.as_ref())
                .map_ok(|meta| meta.location)
                .boxed();
            let deleted = self
                .store
                .delete_stream(locations)
                .try_collect::<Vec<_>>()
                .await?;
            Ok(deleted.len())
        })
    }

    pub(crate) fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub(crate) fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The configured multipart chunk size.
    pub fn multipart_chunk_size(&self) -> u64 {
        self.multipart_chunk_size
    }
}

impl std::fmt::Debug for ObjectStoreGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreGateway")
            .field("store", &self.store)
            .field("multipart_chunk_size", &self.multipart_chunk_size)
            .finish()
    }
}

/// Prefixes are stored with a trailing separator; the object path layer
/// wants them bare, and an empty prefix means the bucket root.
fn object_prefix(prefix: &str) -> Option<ObjectPath> {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(ObjectPath::from(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use tempfile::TempDir;

    fn gateway() -> ObjectStoreGateway {
        ObjectStoreGateway::with_store(Arc::new(InMemory::new()), 1024 * 1024).unwrap()
    }

    #[test]
    fn test_put_get_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("blob.bin");
        fs::write(&source, b"some model bytes").unwrap();

        let gateway = gateway();
        gateway.put_file(&source, "models/blob.bin").unwrap();

        let dest = tmp.path().join("fetched/blob.bin");
        gateway.get_file("models/blob.bin", &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"some model bytes");
    }

    #[test]
    fn test_exists_and_prefix_probes() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("f");
        fs::write(&source, b"x").unwrap();

        let gateway = gateway();
        assert!(!gateway.exists("models/a.tar.gz").unwrap());
        assert!(!gateway.exists_under_prefix("models/").unwrap());

        gateway.put_file(&source, "models/a.tar.gz").unwrap();
        assert!(gateway.exists("models/a.tar.gz").unwrap());
        assert!(gateway.exists_under_prefix("models/").unwrap());
        assert!(!gateway.exists_under_prefix("other/").unwrap());
    }

    #[test]
    fn test_list_and_delete_under_prefix() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("f");
        fs::write(&source, b"x").unwrap();

        let gateway = gateway();
        gateway.put_file(&source, "models/m/a.bin").unwrap();
        gateway.put_file(&source, "models/m/sub/b.bin").unwrap();
        gateway.put_file(&source, "models/other.bin").unwrap();

        let mut keys = gateway.list_under_prefix("models/m/").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["models/m/a.bin", "models/m/sub/b.bin"]);

        assert_eq!(gateway.delete_under_prefix("models/m/").unwrap(), 2);
        assert!(!gateway.exists_under_prefix("models/m/").unwrap());
        assert!(gateway.exists("models/other.bin").unwrap());

        // deleting an empty prefix is a no-op
        assert_eq!(gateway.delete_under_prefix("models/m/").unwrap(), 0);
    }

    #[test]
    fn test_delete_absent_object_is_ok() {
        gateway().delete_object("models/never-there.tar.gz").unwrap();
    }

    #[test]
    fn test_chunked_upload_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("big.bin");
        let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&source, &payload).unwrap();

        // chunk size well below the file size forces the multipart path
        let gateway = ObjectStoreGateway::with_store(Arc::new(InMemory::new()), 8 * 1024).unwrap();
        gateway.put_file(&source, "models/big.tar.gz").unwrap();

        let dest = tmp.path().join("big.out");
        gateway.get_file("models/big.tar.gz", &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), payload);
    }
}
