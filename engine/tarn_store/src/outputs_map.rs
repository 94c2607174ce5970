//! Source-to-outputs tracking.
//!
//! Alongside the snapshot map, a build keeps a record of which output
//! artifacts each source file produced. When a source is removed or
//! recompiled, the previous build's outputs for it are orphans; this map
//! hands them back to the caller, which owns the actual deletion. The
//! engine itself never touches output files.
//!
//! Both keys and stored output paths go through the context's path
//! converter, so a relocatable converter keeps the whole table valid when
//! the project tree moves.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::context::{BuildMetrics, StoreContext};
use crate::error::StoreError;
use crate::externalize::{PathListExternalizer, StringExternalizer};
use crate::paths::FileToPathConverter;
use crate::persistent::PersistentMap;

type OutputsStorage = PersistentMap<String, Vec<PathBuf>, StringExternalizer, PathListExternalizer>;

/// Durable map of source key to the output files built from it.
#[derive(Debug)]
pub struct OutputsMap {
    map: OutputsStorage,
    converter: Arc<dyn FileToPathConverter>,
    metrics: Arc<BuildMetrics>,
}

impl OutputsMap {
    /// Open the map at `storage_path`, recovering from a corrupt backing
    /// file by starting empty, same as the snapshot map.
    pub fn open(
        storage_path: impl Into<PathBuf>,
        context: &StoreContext,
    ) -> Result<Self, StoreError> {
        let (map, recovered) = OutputsStorage::open_or_reset(
            storage_path,
            StringExternalizer,
            PathListExternalizer::new(Arc::clone(&context.converter)),
        )?;
        if let Some(reason) = recovered {
            tracing::warn!(
                path = %map.storage_path().display(),
                reason,
                "outputs storage corrupt; starting from empty state"
            );
            context.metrics.record_storage_recovery();
        }

        Ok(Self {
            map,
            converter: Arc::clone(&context.converter),
            metrics: Arc::clone(&context.metrics),
        })
    }

    /// Record the outputs produced from `source`, replacing any previous
    /// set.
    pub fn set_outputs(&mut self, source: &Path, outputs: Vec<PathBuf>) {
        self.map.insert(self.converter.to_key(source), outputs);
        self.metrics.record_entry_written();
    }

    /// Outputs recorded for `source`, if any.
    #[must_use]
    pub fn outputs_for(&self, source: &Path) -> Option<&[PathBuf]> {
        self.map
            .get(&self.converter.to_key(source))
            .map(Vec::as_slice)
    }

    /// Drop the entry for `source` and return its outputs.
    ///
    /// The returned paths are orphaned artifacts for the caller to delete
    /// (or keep). An untracked source yields an empty list.
    pub fn remove_outputs_for(&mut self, source: &Path) -> Vec<PathBuf> {
        match self.map.remove(&self.converter.to_key(source)) {
            Some(outputs) => {
                self.metrics.record_entry_removed();
                outputs
            }
            None => Vec::new(),
        }
    }

    /// Number of tracked sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no sources are tracked.
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
    pub fn flush(&mut self, forced: bool) -> Result<(), StoreError> {
        if self.map.flush(forced)? {
            self.metrics.record_flush();
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
