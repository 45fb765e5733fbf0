//! Remote layout strategies.
//!
//! A cache instance stores a model remotely in one of two layouts, chosen
//! once at construction:
//!
//! - [`ArchiveRemote`]: one `.tar.gz` object per model at a deterministic
//!   key
//! - [`DirectoryRemote`]: one object per file under a model-specific key
//!   prefix, preserving relative paths
//!
//! The [`RemoteStore`] trait is the seam the coordinator talks through,
//! so per-layout decisions stay out of its control flow.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::warn;

use crate::archive;
use crate::error::CacheResult;
use crate::keys::{KeyMap, ARCHIVE_SUFFIX};
use crate::store::ObjectStoreGateway;

/// One remote representation of a cached model.
pub trait RemoteStore: Send + Sync {
    /// Does a (possibly partial) remote representation exist?
    fn exists(&self, model_id: &str) -> CacheResult<bool>;

    /// Upload the local entry at `local_dir`. On return with `Ok`, the
    /// remote representation is byte-complete.
    fn upload(&self, model_id: &str, local_dir: &Path) -> CacheResult<()>;

    /// Materialize the remote representation into `dest_dir`.
    fn download(&self, model_id: &str, dest_dir: &Path) -> CacheResult<()>;

    /// All model identifiers with a remote representation.
    fn enumerate(&self) -> CacheResult<Vec<String>>;

    /// Remove the remote representation; `Ok(true)` iff something was
    /// actually removed.
    fn delete(&self, model_id: &str) -> CacheResult<bool>;
}

/// Archive layout: one compressed archive object per model.
pub struct ArchiveRemote {
    gateway: Arc<ObjectStoreGateway>,
    keys: KeyMap,
}

impl ArchiveRemote {
    pub fn new(gateway: Arc<ObjectStoreGateway>, keys: KeyMap) -> Self {
        Self { gateway, keys }
    }

    fn remove_staging(&self, staging: &Path) {
        if staging.exists() {
            if let Err(err) = fs::remove_file(staging) {
                warn!("failed to remove staging archive {}: {err}", staging.display());
            }
        }
    }
}

impl RemoteStore for ArchiveRemote {
    fn exists(&self, model_id: &str) -> CacheResult<bool> {
        Ok(self.gateway.exists(&self.keys.archive_key(model_id))?)
    }

    fn upload(&self, model_id: &str, local_dir: &Path) -> CacheResult<()> {
        let staging = self.keys.archive_staging_path(model_id);
        let key = self.keys.archive_key(model_id);

        let outcome = archive::compress(local_dir, &staging)
            .map_err(Into::into)
            .and_then(|()| {
                self.gateway
                    .put_file(&staging, &key)
                    .map_err(Into::into)
            });
        // the staging archive never outlives the transfer, success or not
        self.remove_staging(&staging);
        outcome
    }

    fn download(&self, model_id: &str, dest_dir: &Path) -> CacheResult<()> {
        let staging = self.keys.archive_staging_path(model_id);
        let key = self.keys.archive_key(model_id);
        let dest_parent = dest_dir.parent().unwrap_or_else(|| Path::new("."));

        let outcome = self
            .gateway
            .get_file(&key, &staging)
            .map_err(Into::into)
            .and_then(|()| archive::extract(&staging, dest_parent).map_err(Into::into));
        self.remove_staging(&staging);
        outcome
    }

    fn enumerate(&self) -> CacheResult<Vec<String>> {
        let prefix = self.keys.prefix();
        let mut models = Vec::new();
        for key in self.gateway.list_under_prefix(prefix)? {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            if let Some(name) = rest.strip_suffix(ARCHIVE_SUFFIX) {
                models.push(name.to_string());
            }
        }
        Ok(models)
    }

    fn delete(&self, model_id: &str) -> CacheResult<bool> {
        let key = self.keys.archive_key(model_id);
        if !self.gateway.exists(&key)? {
            return Ok(false);
        }
        self.gateway.delete_object(&key)?;
        Ok(true)
    }
}

/// Directory layout: one object per file, relative paths preserved under
/// the model's key prefix.
pub struct DirectoryRemote {
    gateway: Arc<ObjectStoreGateway>,
    keys: KeyMap,
}

impl DirectoryRemote {
    pub fn new(gateway: Arc<ObjectStoreGateway>, keys: KeyMap) -> Self {
        Self { gateway, keys }
    }
}

impl RemoteStore for DirectoryRemote {
    fn exists(&self, model_id: &str) -> CacheResult<bool> {
        Ok(self
            .gateway
            .exists_under_prefix(&self.keys.dir_prefix(model_id))?)
    }

    fn upload(&self, model_id: &str, local_dir: &Path) -> CacheResult<()> {
        let prefix = self.keys.dir_prefix(model_id);
        let mut files = Vec::new();
        collect_files(local_dir, local_dir, &mut files)?;

        // abort on the first failed upload; the coordinator cleans up
        for (path, rel) in files {
            let key = format!("{prefix}{}", relative_key(&rel));
            self.gateway.put_file(&path, &key)?;
        }
        Ok(())
    }

    fn download(&self, model_id: &str, dest_dir: &Path) -> CacheResult<()> {
        let prefix = self.keys.dir_prefix(model_id);
        fs::create_dir_all(dest_dir)?;
        for key in self.gateway.list_under_prefix(&prefix)? {
            let Some(rel) = key.strip_prefix(&prefix) else {
                continue;
            };
            if rel.is_empty() {
                continue;
            }
            let dest: PathBuf = dest_dir.join(rel.split('/').collect::<PathBuf>());
            self.gateway.get_file(&key, &dest)?;
        }
        Ok(())
    }

    fn enumerate(&self) -> CacheResult<Vec<String>> {
        let prefix = self.keys.prefix();
        let mut models: Vec<String> = Vec::new();
        for key in self.gateway.list_under_prefix(prefix)? {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            let Some((name, _)) = rest.split_once('/') else {
                continue;
            };
            if !name.is_empty() && !models.iter().any(|m| m == name) {
                models.push(name.to_string());
            }
        }
        Ok(models)
    }

    fn delete(&self, model_id: &str) -> CacheResult<bool> {
        let deleted = self
            .gateway
            .delete_under_prefix(&self.keys.dir_prefix(model_id))?;
        Ok(deleted > 0)
    }
}

/// Regular files under `dir`, with their paths relative to `base`.
fn collect_files(base: &Path, dir: &Path, out: &mut Vec<(PathBuf, PathBuf)>) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(base, &path, out)?;
        } else if file_type.is_file() {
            if let Ok(rel) = path.strip_prefix(base) {
                let rel = rel.to_path_buf();
                out.push((path, rel));
            }
        } else {
            warn!("skipping non-regular file: {}", path.display());
        }
    }
    Ok(())
}

/// Join path components with `/` regardless of platform separator.
fn relative_key(rel: &Path) -> String {
    rel.iter()
        .map(|component| component.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_key_joins_with_slash() {
        let rel: PathBuf = ["sub", "dir", "file.bin"].iter().collect();
        assert_eq!(relative_key(&rel), "sub/dir/file.bin");
    }
}
