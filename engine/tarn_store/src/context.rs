//! Injected context for the storage layer.
//!
//! Everything the maps need from their surroundings arrives through
//! [`StoreContext`]: the path-to-key strategy and the metrics sink. The
//! counters are an explicit object handed down from the build driver, not
//! process-wide globals, so side-by-side engines (tests, parallel builds of
//! separate projects) never bleed counts into each other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::paths::{AbsolutePathConverter, FileToPathConverter};

/// Shared dependencies of every map in one store.
///
/// Cheap to clone; clones share the same converter and counters.
#[derive(Debug, Clone)]
pub struct StoreContext {
    /// Path-to-key strategy for storage keys.
    pub converter: Arc<dyn FileToPathConverter>,
    /// Counter sink for this build.
    pub metrics: Arc<BuildMetrics>,
}

impl StoreContext {
    /// Context with the given converter and fresh counters.
    #[must_use]
    pub fn new(converter: Arc<dyn FileToPathConverter>) -> Self {
        Self {
            converter,
            metrics: Arc::new(BuildMetrics::default()),
        }
    }

    /// Context keyed by absolute paths, with fresh counters.
    #[must_use]
    pub fn with_absolute_paths() -> Self {
        Self::new(Arc::new(AbsolutePathConverter))
    }
}

/// Build counters, atomic so a parallel hashing phase can feed the same
/// sink as the sequential map updates.
#[derive(Debug, Default)]
pub struct BuildMetrics {
    snapshots_computed: AtomicU64,
    unreadable_files: AtomicU64,
    entries_written: AtomicU64,
    entries_removed: AtomicU64,
    storage_recoveries: AtomicU64,
    flushes: AtomicU64,
}

impl BuildMetrics {
    /// A file's content was hashed.
    pub fn record_snapshot(&self) {
        self.snapshots_computed.fetch_add(1, Ordering::Relaxed);
    }

    /// A file was skipped because it could not be read.
    pub fn record_unreadable_file(&self) {
        self.unreadable_files.fetch_add(1, Ordering::Relaxed);
    }

    /// An entry was written into a map image.
    pub fn record_entry_written(&self) {
        self.entries_written.fetch_add(1, Ordering::Relaxed);
    }

    /// An entry was dropped from a map image.
    pub fn record_entry_removed(&self) {
        self.entries_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// A corrupt backing file was replaced by the empty state.
    pub fn record_storage_recovery(&self) {
        self.storage_recoveries.fetch_add(1, Ordering::Relaxed);
    }

    /// A map image was written out to disk.
    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the counters for reporting.
    #[must_use]
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            snapshots_computed: self.snapshots_computed.load(Ordering::Relaxed),
            unreadable_files: self.unreadable_files.load(Ordering::Relaxed),
            entries_written: self.entries_written.load(Ordering::Relaxed),
            entries_removed: self.entries_removed.load(Ordering::Relaxed),
            storage_recoveries: self.storage_recoveries.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter, typically at the start of a build.
    pub fn reset(&self) {
        self.snapshots_computed.store(0, Ordering::Relaxed);
        self.unreadable_files.store(0, Ordering::Relaxed);
        self.entries_written.store(0, Ordering::Relaxed);
        self.entries_removed.store(0, Ordering::Relaxed);
        self.storage_recoveries.store(0, Ordering::Relaxed);
        self.flushes.store(0, Ordering::Relaxed);
    }
}

/// Plain counter values for the build driver's diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsReport {
    /// Files whose content was hashed.
    pub snapshots_computed: u64,
    /// Files skipped as unreadable.
    pub unreadable_files: u64,
    /// Entries written into map images.
    pub entries_written: u64,
    /// Entries dropped from map images.
    pub entries_removed: u64,
    /// Corrupt backing files replaced by the empty state.
    pub storage_recoveries: u64,
    /// Map images written out to disk.
    pub flushes: u64,
}
