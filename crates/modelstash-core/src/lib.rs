//! modelstash-core - two-tier cache for immutable model artifacts.
//!
//! Keeps large model artifacts available in a local filesystem cache and
//! an S3-compatible object store, making sure expensive fetches and
//! uploads happen at most once per artifact, that failures never leave
//! the two tiers inconsistent, and that multi-gigabyte archives stream
//! through bounded memory.
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`cache`] | `ModelCache` coordinator: ensure/materialize/enumerate/evict |
//! | [`layout`] | Remote layout strategies (single archive vs. one object per file) |
//! | [`archive`] | Streaming `.tar.gz` codec |
//! | [`store`] | Synchronous object store gateway |
//! | [`keys`] | Identifier to path/key mapping |
//! | [`fetcher`] | Upstream model-source boundary |
//! | [`observer`] | Per-operation instrumentation hooks |
//! | [`config`] | Cache configuration |
//! | [`error`] | Unified error types |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use modelstash_core::{CacheConfig, DirCopyFetcher, ModelCache};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CacheConfig::new(
//!     "model-bucket",
//!     "https://s3.example.com",
//!     "access-key",
//!     "secret-key",
//! );
//! let fetcher = DirCopyFetcher::new("/srv/model-snapshots");
//! let cache = ModelCache::connect(config, fetcher)?;
//!
//! cache.ensure_cached("huggingface/bert-base-uncased", false)?;
//! let path = cache.materialize("huggingface/bert-base-uncased")?;
//! println!("model ready at {}", path.display());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod keys;
pub mod layout;
mod multipart;
pub mod observer;
pub mod store;

pub use cache::{ListSource, ModelCache};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use fetcher::{DirCopyFetcher, FetchError, FetchResult, ModelFetcher, NoFetcher};
pub use keys::KeyMap;
pub use layout::{ArchiveRemote, DirectoryRemote, RemoteStore};
pub use observer::{CacheObserver, CacheOp, LogObserver, NoopObserver, OperationOutcome};
pub use store::{ObjectStoreGateway, StoreError};
