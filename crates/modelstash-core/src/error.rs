//! Unified error types for the modelstash-core public API.
//!
//! Internal modules carry their own error types (`ArchiveError`,
//! `StoreError`, `FetchError`) and convert to [`CacheError`] at the
//! coordinator boundary.
//!
//! # Error Hierarchy
//!
//! ```text
//! CacheError
//! ├── Config(String)        -- missing/invalid settings, caught before I/O
//! ├── Connect(StoreError)   -- reachability probe failed at construction
//! ├── Fetch(FetchError)     -- upstream model-source fetch failed
//! ├── Archive(ArchiveError) -- compress/extract failures
//! ├── Store(StoreError)     -- object store transfer failures
//! ├── NotFound(String)      -- no cached representation on either tier
//! ├── InvalidIdentifier     -- empty model identifier
//! ├── InvalidSource(String) -- enumerate() source was not local/remote
//! └── Io(std::io::Error)    -- local filesystem failures
//! ```

use std::io;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::fetcher::FetchError;
use crate::store::StoreError;

/// The canonical error type for all public cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Missing or invalid configuration, detected before any I/O
    #[error("configuration error: {0}")]
    Config(String),

    /// Object store unreachable or bucket inaccessible at construction time
    #[error("object store unreachable: {0}")]
    Connect(#[source] StoreError),

    /// The external model-source fetcher failed
    #[error("upstream fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Archive compression or extraction failed
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// An object store transfer failed
    #[error("object store error: {0}")]
    Store(#[from] StoreError),

    /// No cached representation exists for the identifier
    #[error("model not cached: {0}")]
    NotFound(String),

    /// Model identifiers must be non-empty
    #[error("model identifier must not be empty")]
    InvalidIdentifier,

    /// `enumerate` was asked for an unknown source
    #[error("list source must be \"local\" or \"remote\", got {0:?}")]
    InvalidSource(String),

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for modelstash-core.
pub type CacheResult<T> = Result<T, CacheError>;
