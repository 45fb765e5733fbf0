//! Upstream model-source boundary.
//!
//! The coordinator does not know how model artifacts come into existence;
//! it hands a [`ModelFetcher`] the identifier and a destination directory
//! and expects the directory to be populated on success. Resume semantics
//! for a partially populated destination are the fetcher's concern.
//!
//! Closures with the right shape implement the trait, which keeps tests
//! and embedders lightweight. [`DirCopyFetcher`] covers the common
//! air-gapped setup where snapshots already live on disk; a network
//! model-source client is out of scope here and plugs in the same way.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::keys::KeyMap;

/// Error raised by a model fetcher.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct FetchError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FetchError {
    /// A fetch error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// A fetch error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Produces a model artifact at a destination directory.
pub trait ModelFetcher: Send + Sync {
    /// Materialize `model_id` into `dest_dir`, creating it if needed.
    /// The destination may already be partially populated from an earlier
    /// interrupted attempt.
    fn fetch(&self, model_id: &str, dest_dir: &Path) -> FetchResult<()>;
}

impl<F> ModelFetcher for F
where
    F: Fn(&str, &Path) -> FetchResult<()> + Send + Sync,
{
    fn fetch(&self, model_id: &str, dest_dir: &Path) -> FetchResult<()> {
        self(model_id, dest_dir)
    }
}

impl ModelFetcher for Box<dyn ModelFetcher> {
    fn fetch(&self, model_id: &str, dest_dir: &Path) -> FetchResult<()> {
        (**self).fetch(model_id, dest_dir)
    }
}

/// Fetcher that copies snapshots from a local source tree, one
/// subdirectory per sanitized identifier.
#[derive(Debug, Clone)]
pub struct DirCopyFetcher {
    source_root: PathBuf,
}

impl DirCopyFetcher {
    /// Fetch snapshots from `source_root/<sanitized id>/`.
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
        }
    }
}

impl ModelFetcher for DirCopyFetcher {
    fn fetch(&self, model_id: &str, dest_dir: &Path) -> FetchResult<()> {
        let source = self.source_root.join(KeyMap::sanitize(model_id));
        if !source.is_dir() {
            return Err(FetchError::new(format!(
                "no snapshot for {model_id} under {}",
                self.source_root.display()
            )));
        }
        copy_tree(&source, dest_dir).map_err(|err| {
            FetchError::with_source(
                format!("copying snapshot of {model_id} failed"),
                err.into(),
            )
        })
    }
}

/// Fetcher for deployments where artifacts are always pre-materialized;
/// any attempt to fetch is an error.
#[derive(Debug, Clone, Default)]
pub struct NoFetcher;

impl ModelFetcher for NoFetcher {
    fn fetch(&self, model_id: &str, _dest_dir: &Path) -> FetchResult<()> {
        Err(FetchError::new(format!(
            "{model_id} is not cached locally and no upstream fetcher is configured"
        )))
    }
}

fn copy_tree(source: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else if file_type.is_file() {
            // overwrite: a retried fetch replaces partial files
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
