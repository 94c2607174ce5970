//! The file snapshot map: stored fingerprints and compare-and-update.
//!
//! One map instance tracks one set of inputs across builds. Each build
//! hands the *complete* current file set to
//! [`compare_and_update`](FileSnapshotMap::compare_and_update); the map
//! answers with what changed since the previous call and commits the fresh
//! snapshots as the new baseline. History never goes deeper than one build:
//! comparison is always against the immediately prior committed state.
//!
//! A first build (no backing file) reports every file as modified and
//! nothing as removed, which is exactly the full-rebuild behavior a cold
//! cache should produce.
//!
//! The map is single-threaded and owned by one build process. Callers that
//! hash in parallel do so through the stateless provider helpers before
//! applying results here sequentially.

use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tarn_snapshot::{FileSnapshot, SnapshotDiff, SnapshotProvider, StreamingSnapshotProvider};

use crate::context::{BuildMetrics, StoreContext};
use crate::error::StoreError;
use crate::externalize::{SnapshotExternalizer, StringExternalizer};
use crate::paths::FileToPathConverter;
use crate::persistent::PersistentMap;

type SnapshotStorage =
    PersistentMap<String, FileSnapshot, StringExternalizer, SnapshotExternalizer>;

/// Durable map of path key to [`FileSnapshot`], with change detection.
#[derive(Debug)]
pub struct FileSnapshotMap {
    map: SnapshotStorage,
    provider: Box<dyn SnapshotProvider>,
    converter: Arc<dyn FileToPathConverter>,
    metrics: Arc<BuildMetrics>,
}

impl FileSnapshotMap {
    /// Open the map at `storage_path`, hashing files on demand with the
    /// stateless streaming provider.
    ///
    /// A corrupt backing file is not an error here: the map recovers by
    /// starting from the empty state (one full rebuild), logs the reason,
    /// and counts the recovery. Storage is an optimization, never a source
    /// of truth.
    pub fn open(
        storage_path: impl Into<PathBuf>,
        context: &StoreContext,
    ) -> Result<Self, StoreError> {
        Self::open_with_provider(storage_path, context, Box::new(StreamingSnapshotProvider))
    }

    /// Open with a caller-chosen provider (e.g. a caching one for drivers
    /// that snapshot the same files repeatedly within a build).
    pub fn open_with_provider(
        storage_path: impl Into<PathBuf>,
        context: &StoreContext,
        provider: Box<dyn SnapshotProvider>,
    ) -> Result<Self, StoreError> {
        let storage_path = storage_path.into();
        let (map, recovered) = SnapshotStorage::open_or_reset(
            storage_path,
            StringExternalizer,
            SnapshotExternalizer,
        )?;
        if let Some(reason) = recovered {
            tracing::warn!(
                path = %map.storage_path().display(),
                reason,
                "snapshot storage corrupt; starting from empty state (full rebuild)"
            );
            context.metrics.record_storage_recovery();
        }

        Ok(Self {
            map,
            provider,
            converter: Arc::clone(&context.converter),
            metrics: Arc::clone(&context.metrics),
        })
    }

    /// Compare `files` against the stored snapshots and commit the new
    /// state.
    ///
    /// For every file in the current set a fresh snapshot is computed and
    /// written into the map unconditionally, refreshing the advisory
    /// timestamp even when nothing changed. The returned diff contains:
    ///
    /// - `modified`: files with no stored snapshot (new) or whose stored
    ///   snapshot no longer matches (changed);
    /// - `removed`: previously tracked files absent from `files`; their
    ///   entries are dropped.
    ///
    /// A file that cannot be read is skipped and treated exactly like an
    /// absent path: it contributes nothing to the new state, so a
    /// previously tracked file that vanished mid-build surfaces in
    /// `removed`. Other files are unaffected. Mutation is purely in-memory;
    /// durability waits for [`flush`](Self::flush).
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn compare_and_update<I>(&mut self, files: I) -> SnapshotDiff
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut current: FxHashMap<String, PathBuf> = FxHashMap::default();
        for path in files {
            current.insert(self.converter.to_key(&path), path);
        }

        // Snapshot every readable file; the rest drop out of the current
        // set so stale-entry handling treats them as absent.
        let mut fresh: Vec<(String, FileSnapshot)> = Vec::with_capacity(current.len());
        let mut skipped: Vec<String> = Vec::new();
        for (key, path) in &current {
            match self.provider.snapshot(path) {
                Ok(snapshot) => {
                    self.metrics.record_snapshot();
                    fresh.push((key.clone(), snapshot));
                }
                Err(err) => {
                    if err.is_not_found() {
                        tracing::debug!(error = %err, "file absent at snapshot time");
                    } else {
                        tracing::warn!(error = %err, "skipping unreadable file");
                        self.metrics.record_unreadable_file();
                    }
                    skipped.push(key.clone());
                }
            }
        }
        for key in &skipped {
            current.remove(key);
        }

        let mut diff = SnapshotDiff::new();

        for (key, snapshot) in fresh {
            let changed = match self.map.get(&key) {
                None => true,
                Some(stored) => *stored != snapshot,
            };
            if changed {
                if let Some(path) = current.get(&key) {
                    diff.modified.push(path.clone());
                }
            }

            self.map.insert(key, snapshot);
            self.metrics.record_entry_written();
        }

        let stale: Vec<String> = self
            .map
            .keys()
            .filter(|key| !current.contains_key(*key))
            .cloned()
            .collect();
        for key in stale {
            self.map.remove(&key);
            self.metrics.record_entry_removed();
            diff.removed.push(self.converter.to_file(&key));
        }

        tracing::debug!(
            modified = diff.modified.len(),
            removed = diff.removed.len(),
            tracked = self.map.len(),
            "snapshot comparison complete"
        );

        diff
    }

    /// Stored snapshot for `path`, if the file is currently tracked.
    #[must_use]
    pub fn stored(&self, path: &Path) -> Option<FileSnapshot> {
        self.map.get(&self.converter.to_key(path)).copied()
    }

    /// Number of tracked files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no files are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// True when there are committed changes the backing file has not
    /// seen.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.map.is_dirty()
    }

    /// Write the map out if it has pending changes, or unconditionally
    /// when `forced`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn flush(&mut self, forced: bool) -> Result<(), StoreError> {
        if self.map.flush(forced)? {
            self.metrics.record_flush();
            tracing::debug!(
                path = %self.map.storage_path().display(),
                entries = self.map.len(),
                "snapshot map flushed"
            );
        }
        Ok(())
    }

    /// Flush pending changes and release the map.
    pub fn close(mut self) -> Result<(), StoreError> {
        if self.map.flush(false)? {
            self.metrics.record_flush();
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
