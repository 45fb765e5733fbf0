//! Streaming archive codec - directory trees to `.tar.gz` and back.
//!
//! Both directions stream entry by entry, so memory use is bounded by
//! per-file buffering no matter how large the tree is. Archive entries are
//! rooted at the source directory's own name, so extraction into a parent
//! directory reconstructs the same top-level directory.
//!
//! Non-regular files (symlinks, sockets, ...) are skipped with a warning;
//! regular files and directories round-trip exactly, relative paths and
//! byte contents included.
//!
//! The codec never cleans up a partially written destination. The caller
//! owns both the archive file and the extraction target.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{info, warn};
use thiserror::Error;

/// Files above this size get a progress log line.
pub const LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Error type for archive operations.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("not a directory: {0}")]
    InvalidSource(String),
    #[error("archive entry escapes destination: {0}")]
    UnsafeEntry(String),
}

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Compress `source_dir` into a gzip-compressed tar at `dest_archive`.
///
/// Entry paths are rooted at `source_dir`'s final component. Files are
/// streamed into the archive one at a time; directory entries are written
/// too so that empty directories survive the round trip.
pub fn compress(source_dir: &Path, dest_archive: &Path) -> ArchiveResult<()> {
    if !source_dir.is_dir() {
        return Err(ArchiveError::InvalidSource(source_dir.display().to_string()));
    }
    let root_name = source_dir
        .file_name()
        .ok_or_else(|| ArchiveError::InvalidSource(source_dir.display().to_string()))?
        .to_owned();

    info!(
        "compressing {} -> {}",
        source_dir.display(),
        dest_archive.display()
    );

    let file = File::create(dest_archive)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    append_tree(&mut builder, source_dir, Path::new(&root_name))?;

    let encoder = builder.into_inner()?;
    let mut writer = encoder.finish()?;
    writer.flush()?;
    Ok(())
}

fn append_tree<W: Write>(
    builder: &mut tar::Builder<W>,
    dir: &Path,
    arc_prefix: &Path,
) -> ArchiveResult<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    // Deterministic entry order keeps repeated archives comparable.
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let arcname = arc_prefix.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            builder.append_dir(&arcname, &path)?;
            append_tree(builder, &path, &arcname)?;
        } else if file_type.is_file() {
            let size = entry.metadata()?.len();
            builder.append_path_with_name(&path, &arcname)?;
            if size > LARGE_FILE_THRESHOLD {
                info!(
                    "added large file {} ({:.1} MiB)",
                    path.display(),
                    size as f64 / (1024.0 * 1024.0)
                );
            }
        } else {
            warn!("skipping non-regular file: {}", path.display());
        }
    }
    Ok(())
}

/// Extract `source_archive` into `dest_parent`, entry by entry.
///
/// Parent directories are created on demand, so entry order does not
/// matter. Entries whose paths would escape `dest_parent` abort the
/// extraction.
pub fn extract(source_archive: &Path, dest_parent: &Path) -> ArchiveResult<()> {
    info!(
        "extracting {} -> {}",
        source_archive.display(),
        dest_parent.display()
    );

    let file = File::open(source_archive)?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let mut archive = tar::Archive::new(decoder);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();
        let size = entry.size();
        if size > LARGE_FILE_THRESHOLD {
            info!(
                "extracting large file {} ({:.1} MiB)",
                entry_path.display(),
                size as f64 / (1024.0 * 1024.0)
            );
        }
        if !entry.unpack_in(dest_parent)? {
            return Err(ArchiveError::UnsafeEntry(entry_path.display().to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn build_tree(root: &Path) {
        fs::create_dir_all(root.join("sub/nested")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("weights.bin"), vec![7u8; 4096]).unwrap();
        fs::write(root.join("config.json"), b"{\"layers\": 12}").unwrap();
        fs::write(root.join("sub/nested/vocab.txt"), b"alpha\nbeta\n").unwrap();
    }

    #[test]
    fn test_roundtrip_preserves_paths_and_bytes() -> ArchiveResult<()> {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("bert-base");
        build_tree(&source);

        let archive = tmp.path().join("bert-base.tar.gz");
        compress(&source, &archive)?;
        assert!(archive.exists());

        let out = tmp.path().join("out");
        fs::create_dir(&out).unwrap();
        extract(&archive, &out)?;

        let extracted = out.join("bert-base");
        assert_eq!(fs::read(extracted.join("weights.bin")).unwrap(), vec![7u8; 4096]);
        assert_eq!(
            fs::read(extracted.join("config.json")).unwrap(),
            b"{\"layers\": 12}"
        );
        assert_eq!(
            fs::read(extracted.join("sub/nested/vocab.txt")).unwrap(),
            b"alpha\nbeta\n"
        );
        assert!(extracted.join("empty").is_dir());
        Ok(())
    }

    #[test]
    fn test_compress_rejects_missing_source() {
        let tmp = TempDir::new().unwrap();
        let err = compress(
            &tmp.path().join("does-not-exist"),
            &tmp.path().join("out.tar.gz"),
        )
        .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidSource(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() -> ArchiveResult<()> {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("model");
        build_tree(&source);
        std::os::unix::fs::symlink(source.join("config.json"), source.join("link.json")).unwrap();

        let archive = tmp.path().join("model.tar.gz");
        compress(&source, &archive)?;

        let out = tmp.path().join("out");
        fs::create_dir(&out).unwrap();
        extract(&archive, &out)?;

        let extracted = out.join("model");
        assert!(extracted.join("config.json").exists());
        assert!(!extracted.join("link.json").exists());
        Ok(())
    }
}
