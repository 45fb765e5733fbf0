//! End-to-end cache flows over an in-memory object store.
//!
//! Exercises the public API the way an embedding service would: populate,
//! enumerate, evict the local tier, materialize back from remote, and
//! finally evict everything - in both remote layouts, plus the chunked
//! upload path for archives larger than the multipart threshold.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use object_store::memory::InMemory;
use tempfile::TempDir;

use modelstash_core::{
    ArchiveRemote, DirectoryRemote, FetchError, FetchResult, KeyMap, ListSource, ModelCache,
    ObjectStoreGateway, RemoteStore,
};

/// Deterministic, incompressible payload so archives stay close to their
/// raw size (the multipart test depends on that).
fn payload(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9e37_79b9;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        })
        .collect()
}

fn snapshot_fetcher(payload_len: usize) -> impl Fn(&str, &Path) -> FetchResult<()> {
    move |_model_id: &str, dest: &Path| {
        let io = |err: std::io::Error| FetchError::new(err.to_string());
        fs::create_dir_all(dest.join("encoder")).map_err(io)?;
        fs::write(dest.join("weights.bin"), payload(payload_len)).map_err(io)?;
        fs::write(dest.join("config.json"), b"{\"hidden\": 768}").map_err(io)?;
        fs::write(dest.join("encoder/vocab.txt"), b"a\nb\nc\n").map_err(io)?;
        Ok(())
    }
}

fn build_cache(
    tmp: &TempDir,
    archive_mode: bool,
    multipart_chunk_size: u64,
    payload_len: usize,
) -> (ModelCache, Arc<ObjectStoreGateway>, KeyMap) {
    let keys = KeyMap::new(tmp.path().join("cache"), "models/");
    let gateway = Arc::new(
        ObjectStoreGateway::with_store(Arc::new(InMemory::new()), multipart_chunk_size).unwrap(),
    );
    let remote: Box<dyn RemoteStore> = if archive_mode {
        Box::new(ArchiveRemote::new(gateway.clone(), keys.clone()))
    } else {
        Box::new(DirectoryRemote::new(gateway.clone(), keys.clone()))
    };
    let cache =
        ModelCache::with_remote(keys.clone(), remote, snapshot_fetcher(payload_len)).unwrap();
    (cache, gateway, keys)
}

fn assert_snapshot_contents(path: &Path, payload_len: usize) {
    assert_eq!(fs::read(path.join("weights.bin")).unwrap(), payload(payload_len));
    assert_eq!(
        fs::read(path.join("config.json")).unwrap(),
        b"{\"hidden\": 768}"
    );
    assert_eq!(fs::read(path.join("encoder/vocab.txt")).unwrap(), b"a\nb\nc\n");
}

#[test]
fn full_lifecycle_archive_mode() {
    let tmp = TempDir::new().unwrap();
    let (cache, gateway, keys) = build_cache(&tmp, true, 1024 * 1024, 4096);
    let model_id = "huggingface/bert-base-uncased";

    cache.ensure_cached(model_id, false).unwrap();
    assert!(gateway
        .exists("models/huggingface_bert-base-uncased.tar.gz")
        .unwrap());

    assert_eq!(
        cache.enumerate(ListSource::Remote).unwrap(),
        vec!["huggingface_bert-base-uncased"]
    );
    assert_eq!(
        cache.enumerate(ListSource::Local).unwrap(),
        vec!["huggingface_bert-base-uncased"]
    );

    // drop the local tier, then restore it from the remote archive
    assert!(cache.evict(model_id, true, false).unwrap());
    assert!(cache.enumerate(ListSource::Local).unwrap().is_empty());

    let path = cache.materialize(model_id).unwrap();
    assert_eq!(path, keys.local_path(model_id));
    assert_snapshot_contents(&path, 4096);

    // evict both tiers; a second eviction has nothing left to remove
    assert!(cache.evict(model_id, true, true).unwrap());
    assert!(!cache.evict(model_id, true, true).unwrap());
    assert!(cache.enumerate(ListSource::Remote).unwrap().is_empty());
}

#[test]
fn full_lifecycle_directory_mode() {
    let tmp = TempDir::new().unwrap();
    let (cache, gateway, _keys) = build_cache(&tmp, false, 1024 * 1024, 4096);
    let model_id = "org/classifier";

    cache.ensure_cached(model_id, false).unwrap();

    // one object per source file, relative paths preserved
    let mut listed = gateway.list_under_prefix("models/org_classifier/").unwrap();
    listed.sort();
    assert_eq!(
        listed,
        vec![
            "models/org_classifier/config.json",
            "models/org_classifier/encoder/vocab.txt",
            "models/org_classifier/weights.bin",
        ]
    );

    assert!(cache.evict(model_id, true, false).unwrap());
    let path = cache.materialize(model_id).unwrap();
    assert_snapshot_contents(&path, 4096);

    assert!(cache.evict(model_id, true, true).unwrap());
    assert!(gateway.list_under_prefix("models/").unwrap().is_empty());
}

#[test]
fn large_archive_takes_multipart_path() {
    let tmp = TempDir::new().unwrap();
    // 16 KiB chunks against a ~200 KiB payload forces chunked upload of
    // the archive object
    let (cache, gateway, _keys) = build_cache(&tmp, true, 16 * 1024, 200_000);
    let model_id = "org/large-model";

    cache.ensure_cached(model_id, false).unwrap();
    assert!(gateway.exists("models/org_large-model.tar.gz").unwrap());

    assert!(cache.evict(model_id, true, false).unwrap());
    let path = cache.materialize(model_id).unwrap();
    assert_snapshot_contents(&path, 200_000);
}
