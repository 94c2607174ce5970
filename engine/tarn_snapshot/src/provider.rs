//! Snapshot computation from the filesystem.
//!
//! [`snapshot_file`] is the ground truth: one metadata call for the mtime,
//! then the entire content streamed through the digest fold. Size is counted
//! during the same read pass, so size and digest always describe the same
//! bytes even if the file is being rewritten concurrently.
//!
//! Failures are per-file values, never batch aborts: a file that vanishes
//! between enumeration and snapshotting surfaces as [`SnapshotError::NotFound`]
//! and leaves every other file's result untouched. Change detection maps
//! both failure kinds to "absent from the current set".

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::digest::DigestBuilder;
use crate::snapshot::{epoch_millis, FileSnapshot};

/// Error while snapshotting a single file.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// File does not exist (or vanished between enumeration and hashing).
    #[error("file not found: '{}'", path.display())]
    NotFound {
        /// Path that could not be found.
        path: PathBuf,
    },
    /// Any other I/O failure while reading the file.
    #[error("failed to read '{}': {source}", path.display())]
    Unreadable {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

impl SnapshotError {
    /// True for the vanished-file case.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn io_error(path: &Path, source: io::Error) -> SnapshotError {
    if source.kind() == io::ErrorKind::NotFound {
        SnapshotError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        SnapshotError::Unreadable {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Computes the snapshot of one file.
///
/// Implementations must be deterministic: identical content yields identical
/// digests across calls, processes, and platforms.
pub trait SnapshotProvider: std::fmt::Debug {
    /// Snapshot one file: metadata plus whole-content digest.
    fn snapshot(&mut self, path: &Path) -> Result<FileSnapshot, SnapshotError>;
}

/// Stateless provider: stats and re-hashes on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamingSnapshotProvider;

impl SnapshotProvider for StreamingSnapshotProvider {
    fn snapshot(&mut self, path: &Path) -> Result<FileSnapshot, SnapshotError> {
        snapshot_file(path)
    }
}

/// Caching provider with a metadata-based re-hash fast path.
///
/// When a path is requested again and its size and mtime still match the
/// cached snapshot, the cached value is returned without touching the file
/// content. A matching mtime can in principle hide an in-place rewrite
/// within the filesystem's timestamp granularity; callers that cannot accept
/// that use [`StreamingSnapshotProvider`].
#[derive(Debug, Default)]
pub struct CachingSnapshotProvider {
    cache: FxHashMap<PathBuf, FileSnapshot>,
    fast_path_hits: u64,
}

impl CachingSnapshotProvider {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached snapshot for `path`, if any.
    #[must_use]
    pub fn cached(&self, path: &Path) -> Option<&FileSnapshot> {
        self.cache.get(path)
    }

    /// Number of requests answered from the cache without re-hashing.
    #[must_use]
    pub fn fast_path_hits(&self) -> u64 {
        self.fast_path_hits
    }

    /// Drop all cached snapshots.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl SnapshotProvider for CachingSnapshotProvider {
    fn snapshot(&mut self, path: &Path) -> Result<FileSnapshot, SnapshotError> {
        if let Some(cached) = self.cache.get(path) {
            if let Ok(meta) = fs::metadata(path) {
                let mtime_ms = meta.modified().map_or(0, epoch_millis);
                if cached.size == meta.len() && cached.mtime_ms == mtime_ms {
                    self.fast_path_hits += 1;
                    return Ok(*cached);
                }
            }
        }

        let fresh = snapshot_file(path)?;
        self.cache.insert(path.to_path_buf(), fresh);
        Ok(fresh)
    }
}

/// Snapshot one file from disk.
///
/// Opens the file, takes mtime from the open handle, then streams the
/// content through the digest fold in 8 KiB chunks, counting bytes for the
/// size field.
pub fn snapshot_file(path: &Path) -> Result<FileSnapshot, SnapshotError> {
    let mut file = File::open(path).map_err(|e| io_error(path, e))?;
    let meta = file.metadata().map_err(|e| io_error(path, e))?;
    let mtime_ms = meta.modified().map_or(0, epoch_millis);

    let mut builder = DigestBuilder::new();
    let mut size: u64 = 0;
    let mut buffer = [0u8; 8192];
    loop {
        let n = file.read(&mut buffer).map_err(|e| io_error(path, e))?;
        if n == 0 {
            break;
        }
        size += n as u64;
        builder.update(&buffer[..n]);
    }

    Ok(FileSnapshot::new(size, mtime_ms, builder.finish()))
}

/// Snapshot many files in parallel, preserving input order.
///
/// Each file's outcome is independent; failures are returned in place so one
/// unreadable file never aborts the batch.
#[must_use]
pub fn snapshot_files(paths: &[PathBuf]) -> Vec<(PathBuf, Result<FileSnapshot, SnapshotError>)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), snapshot_file(path)))
        .collect()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
