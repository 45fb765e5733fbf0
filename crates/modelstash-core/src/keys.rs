//! Key mapping - identifier to local path and object key derivations.
//!
//! Model identifiers (typically `namespace/name`) contain the path
//! separator, which is unsafe in both filesystem paths and object keys.
//! [`KeyMap::sanitize`] is the single substitution point; every derived
//! path and key goes through it so that all call sites agree.

use std::path::{Path, PathBuf};

/// Suffix of archive-mode objects.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Pure, deterministic mapping from model identifiers to cache locations.
///
/// Holds the two configuration-level roots: the local cache directory and
/// the remote key prefix (normalized to a single trailing separator).
/// No I/O happens here.
#[derive(Debug, Clone)]
pub struct KeyMap {
    cache_root: PathBuf,
    prefix: String,
}

impl KeyMap {
    /// Create a key map over the given cache root and remote prefix.
    pub fn new(cache_root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            cache_root: cache_root.into(),
            prefix: normalize_prefix(&prefix.into()),
        }
    }

    /// Replace path separators in an identifier with `_`.
    ///
    /// `"huggingface/bert-base-uncased"` becomes
    /// `"huggingface_bert-base-uncased"`.
    pub fn sanitize(model_id: &str) -> String {
        model_id.replace('/', "_")
    }

    /// The local cache root directory.
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// The normalized remote key prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Local directory holding the materialized artifact.
    pub fn local_path(&self, model_id: &str) -> PathBuf {
        self.cache_root.join(Self::sanitize(model_id))
    }

    /// Object key of the single archive (archive mode only).
    pub fn archive_key(&self, model_id: &str) -> String {
        format!("{}{}{ARCHIVE_SUFFIX}", self.prefix, Self::sanitize(model_id))
    }

    /// Key prefix holding one object per file (directory mode only).
    /// Always ends in a separator.
    pub fn dir_prefix(&self, model_id: &str) -> String {
        format!("{}{}/", self.prefix, Self::sanitize(model_id))
    }

    /// Temporary archive path used while transferring, inside the cache
    /// root so it shares a filesystem with the entries.
    pub fn archive_staging_path(&self, model_id: &str) -> PathBuf {
        self.cache_root
            .join(format!("{}{ARCHIVE_SUFFIX}", Self::sanitize(model_id)))
    }
}

/// Collapse any trailing separators to exactly one; an empty prefix stays
/// empty (the bucket root).
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(KeyMap::sanitize("org/name"), "org_name");
        assert_eq!(KeyMap::sanitize("a/b/c"), "a_b_c");
        assert_eq!(KeyMap::sanitize("plain-name"), "plain-name");
    }

    #[test]
    fn test_key_determinism() {
        let keys = KeyMap::new("/cache", "models/");
        let model_id = "huggingface/bert-base-uncased";

        assert_eq!(
            keys.local_path(model_id),
            PathBuf::from("/cache/huggingface_bert-base-uncased")
        );
        assert_eq!(
            keys.archive_key(model_id),
            "models/huggingface_bert-base-uncased.tar.gz"
        );
        assert_eq!(
            keys.dir_prefix(model_id),
            "models/huggingface_bert-base-uncased/"
        );
    }

    #[test]
    fn test_prefix_normalization() {
        assert_eq!(KeyMap::new("/c", "models").prefix(), "models/");
        assert_eq!(KeyMap::new("/c", "models///").prefix(), "models/");
        assert_eq!(KeyMap::new("/c", "a/b").prefix(), "a/b/");
        assert_eq!(KeyMap::new("/c", "").prefix(), "");
    }

    #[test]
    fn test_staging_path_lives_in_cache_root() {
        let keys = KeyMap::new("/cache", "models/");
        assert_eq!(
            keys.archive_staging_path("org/name"),
            PathBuf::from("/cache/org_name.tar.gz")
        );
    }
}
