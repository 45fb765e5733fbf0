//! Cache coordinator.
//!
//! [`ModelCache`] keeps one invariant above all others: after any public
//! operation returns, an identifier is either fully represented on a tier
//! or absent from it. Multi-step operations that fail partway collapse
//! the identifier back to absent on both tiers rather than leaving debris
//! a later call would mistake for a complete entry.
//!
//! Operation shapes:
//!
//! - [`ensure_cached`](ModelCache::ensure_cached): remote existence fast
//!   path, upstream fetch on local miss, upload, cleanup of both tiers on
//!   any failure.
//! - [`materialize`](ModelCache::materialize): local hit wins; otherwise
//!   the remote representation is staged into a temporary directory and
//!   renamed into place only when complete.
//! - [`enumerate`](ModelCache::enumerate) /
//!   [`evict`](ModelCache::evict): cache utilities over both tiers.

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use log::{error, info, warn};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::fetcher::ModelFetcher;
use crate::keys::KeyMap;
use crate::layout::{ArchiveRemote, DirectoryRemote, RemoteStore};
use crate::observer::{CacheObserver, CacheOp, NoopObserver, OperationOutcome};
use crate::store::ObjectStoreGateway;

/// Which tier [`ModelCache::enumerate`] inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSource {
    Local,
    Remote,
}

impl ListSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListSource::Local => "local",
            ListSource::Remote => "remote",
        }
    }
}

impl FromStr for ListSource {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(ListSource::Local),
            "remote" | "s3" => Ok(ListSource::Remote),
            other => Err(CacheError::InvalidSource(other.to_string())),
        }
    }
}

/// Two-tier cache coordinator for immutable model artifacts.
pub struct ModelCache {
    keys: KeyMap,
    remote: Box<dyn RemoteStore>,
    fetcher: Box<dyn ModelFetcher>,
    observer: Arc<dyn CacheObserver>,
}

impl ModelCache {
    /// Connect to the object store described by `config`, probe it, and
    /// build a coordinator using the configured remote layout.
    ///
    /// Fails fast on invalid configuration or an unreachable bucket; this
    /// is the only fatal error path, per-identifier operations afterwards
    /// leave the instance usable.
    pub fn connect(config: CacheConfig, fetcher: impl ModelFetcher + 'static) -> CacheResult<Self> {
        config.validate()?;
        let cache_root = config.resolve_cache_root()?;
        let keys = KeyMap::new(cache_root, config.prefix.clone());

        let gateway =
            Arc::new(ObjectStoreGateway::connect(&config).map_err(CacheError::Connect)?);
        let remote: Box<dyn RemoteStore> = if config.store_as_archive {
            Box::new(ArchiveRemote::new(gateway, keys.clone()))
        } else {
            Box::new(DirectoryRemote::new(gateway, keys.clone()))
        };

        Ok(Self {
            keys,
            remote,
            fetcher: Box::new(fetcher),
            observer: Arc::new(NoopObserver),
        })
    }

    /// Build a coordinator over an explicit remote representation.
    ///
    /// This is the bring-your-own-backend constructor: anything
    /// implementing [`RemoteStore`] works, which also makes it the seam
    /// for tests. The cache root named by `keys` is created if absent.
    pub fn with_remote(
        keys: KeyMap,
        remote: Box<dyn RemoteStore>,
        fetcher: impl ModelFetcher + 'static,
    ) -> CacheResult<Self> {
        fs::create_dir_all(keys.cache_root())?;
        Ok(Self {
            keys,
            remote,
            fetcher: Box::new(fetcher),
            observer: Arc::new(NoopObserver),
        })
    }

    /// Attach an observer invoked around every public operation.
    pub fn with_observer(mut self, observer: impl CacheObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// The key map in use.
    pub fn keys(&self) -> &KeyMap {
        &self.keys
    }

    /// Ensure the model's remote representation exists and is complete.
    ///
    /// Fast path: if the representation already exists (and `force_upload`
    /// is off), nothing is fetched or uploaded. Otherwise the local entry
    /// is populated by the fetcher if missing, then uploaded. Any fetch or
    /// upload failure removes the local entry and the remote
    /// representation before the error is returned, so a later call
    /// cannot see partial state as a cache hit.
    pub fn ensure_cached(&self, model_id: &str, force_upload: bool) -> CacheResult<()> {
        self.observed(CacheOp::EnsureCached, model_id, || {
            self.ensure_cached_inner(model_id, force_upload)
        })
    }

    fn ensure_cached_inner(&self, model_id: &str, force_upload: bool) -> CacheResult<()> {
        validate_identifier(model_id)?;

        if !force_upload && self.remote.exists(model_id)? {
            info!("model already present in remote store: {model_id}");
            return Ok(());
        }

        let local_path = self.keys.local_path(model_id);
        if !local_path.exists() {
            if let Err(err) = self.fetcher.fetch(model_id, &local_path) {
                error!("upstream fetch of {model_id} failed: {err}");
                self.cleanup(model_id);
                return Err(err.into());
            }
        }

        if let Err(err) = self.remote.upload(model_id, &local_path) {
            error!("upload of {model_id} failed: {err}");
            self.cleanup(model_id);
            return Err(err);
        }
        Ok(())
    }

    /// Ensure the model is present on local disk and return its path.
    ///
    /// A present local entry is trusted as-is. On a local miss the remote
    /// representation is downloaded into a staging directory inside the
    /// cache root and renamed into place only once complete, so a failed
    /// download or extraction leaves no local entry behind.
    pub fn materialize(&self, model_id: &str) -> CacheResult<PathBuf> {
        self.observed(CacheOp::Materialize, model_id, || {
            self.materialize_inner(model_id)
        })
    }

    fn materialize_inner(&self, model_id: &str) -> CacheResult<PathBuf> {
        validate_identifier(model_id)?;

        let local_path = self.keys.local_path(model_id);
        if local_path.exists() {
            return Ok(local_path);
        }

        if !self.remote.exists(model_id)? {
            return Err(CacheError::NotFound(model_id.to_string()));
        }

        // Stage on the same filesystem as the cache root so the final
        // publish is a rename. The temp dir cleans itself up on failure.
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(self.keys.cache_root())?;
        let staged_entry = staging.path().join(KeyMap::sanitize(model_id));

        self.remote.download(model_id, &staged_entry)?;
        fs::rename(&staged_entry, &local_path)?;
        Ok(local_path)
    }

    /// List cached model identifiers on one tier.
    pub fn enumerate(&self, source: ListSource) -> CacheResult<Vec<String>> {
        self.observed(CacheOp::Enumerate, source.as_str(), || match source {
            ListSource::Local => self.enumerate_local(),
            ListSource::Remote => self.remote.enumerate(),
        })
    }

    fn enumerate_local(&self) -> CacheResult<Vec<String>> {
        let mut models = Vec::new();
        for entry in fs::read_dir(self.keys.cache_root())? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            // staging dirs and other hidden entries are not cache entries
            if name.starts_with('.') {
                continue;
            }
            if entry.file_type()?.is_dir() {
                models.push(name.into_owned());
            }
        }
        models.sort();
        Ok(models)
    }

    /// Remove the model from the selected tiers.
    ///
    /// Returns `Ok(true)` iff at least one tier actually had something
    /// removed; evicting an identifier absent everywhere is `Ok(false)`,
    /// not an error.
    pub fn evict(&self, model_id: &str, local: bool, remote: bool) -> CacheResult<bool> {
        self.observed(CacheOp::Evict, model_id, || {
            self.evict_inner(model_id, local, remote)
        })
    }

    fn evict_inner(&self, model_id: &str, local: bool, remote: bool) -> CacheResult<bool> {
        validate_identifier(model_id)?;

        let mut removed = false;
        if local {
            let local_path = self.keys.local_path(model_id);
            if local_path.exists() {
                fs::remove_dir_all(&local_path)?;
                removed = true;
            }
        }
        if remote {
            removed |= self.remote.delete(model_id)?;
        }
        Ok(removed)
    }

    /// Best-effort removal of both tiers after a failed multi-step
    /// operation. Failures here are logged, not returned: the original
    /// error is the one the caller needs.
    fn cleanup(&self, model_id: &str) {
        let local_path = self.keys.local_path(model_id);
        if local_path.exists() {
            if let Err(err) = fs::remove_dir_all(&local_path) {
                warn!(
                    "cleanup: failed to remove local entry {}: {err}",
                    local_path.display()
                );
            }
        }
        if let Err(err) = self.remote.delete(model_id) {
            warn!("cleanup: failed to remove remote representation of {model_id}: {err}");
        }
    }

    fn observed<T>(
        &self,
        op: CacheOp,
        subject: &str,
        run: impl FnOnce() -> CacheResult<T>,
    ) -> CacheResult<T> {
        self.observer.operation_started(op, subject);
        let started = Instant::now();
        let result = run();
        let outcome = if result.is_ok() {
            OperationOutcome::Success
        } else {
            OperationOutcome::Failure
        };
        self.observer
            .operation_finished(op, subject, outcome, started.elapsed());
        result
    }
}

fn validate_identifier(model_id: &str) -> CacheResult<()> {
    if model_id.trim().is_empty() {
        return Err(CacheError::InvalidIdentifier);
    }
    Ok(())
}
