//! The per-build cache directory and its owned maps.
//!
//! An [`InputsCache`] holds everything one build keeps under its cache
//! directory:
//!
//! - `file-snapshots.tab` — the [`FileSnapshotMap`];
//! - `source-outputs.tab` — the [`OutputsMap`];
//! - `last-build.bin` — a small [`BuildInfo`] record about the previous
//!   build.
//!
//! The cache opens all of them together and fans `flush`/`close` out to
//! every owned map, so a driver deals with one lifecycle instead of three.
//! `close` keeps going past a failing map and aggregates the failures,
//! because an error in one table must not leave the others unflushed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tarn_snapshot::epoch_millis;

use crate::context::StoreContext;
use crate::error::StoreError;
use crate::outputs_map::OutputsMap;
use crate::persistent::FORMAT_VERSION;
use crate::snapshot_map::FileSnapshotMap;

/// File name of the snapshot table inside the cache directory.
pub const SNAPSHOTS_FILE: &str = "file-snapshots.tab";
/// File name of the source-to-outputs table inside the cache directory.
pub const OUTPUTS_FILE: &str = "source-outputs.tab";
/// File name of the last-build info record inside the cache directory.
pub const BUILD_INFO_FILE: &str = "last-build.bin";

/// Facts about a build, persisted for the next one to inspect.
///
/// Diagnostics only: a missing or unreadable record never affects change
/// detection, so it is read tolerantly and written without ceremony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Storage format the writing engine used.
    pub format_version: u32,
    /// Wall-clock start of the build, in milliseconds since the epoch.
    pub started_at_ms: i64,
}

impl BuildInfo {
    /// Record for a build starting now.
    #[must_use]
    pub fn started_now() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            started_at_ms: epoch_millis(SystemTime::now()),
        }
    }

    /// Load a previously written record, or `None` when the file is
    /// missing, unreadable, or from an incompatible format version.
    fn load(path: &Path) -> Option<Self> {
        let bytes = fs::read(path).ok()?;
        let info: Self = bincode::deserialize(&bytes).ok()?;
        (info.format_version == FORMAT_VERSION).then_some(info)
    }
}

/// Owner of the cache directory: both maps plus the last-build record.
#[derive(Debug)]
pub struct InputsCache {
    dir: PathBuf,
    snapshots: FileSnapshotMap,
    outputs: OutputsMap,
    last_build: Option<BuildInfo>,
}

impl InputsCache {
    /// Open (creating if needed) the cache directory and every table in
    /// it.
    ///
    /// Each map applies its own corrupt-storage recovery, so a damaged
    /// cache degrades to a full rebuild instead of an error here.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn open(
        cache_dir: impl Into<PathBuf>,
        context: &StoreContext,
    ) -> Result<Self, StoreError> {
        let dir = cache_dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let snapshots = FileSnapshotMap::open(dir.join(SNAPSHOTS_FILE), context)?;
        let outputs = OutputsMap::open(dir.join(OUTPUTS_FILE), context)?;
        let last_build = BuildInfo::load(&dir.join(BUILD_INFO_FILE));
        tracing::debug!(
            dir = %dir.display(),
            tracked_files = snapshots.len(),
            tracked_sources = outputs.len(),
            has_previous_build = last_build.is_some(),
            "inputs cache opened"
        );

        Ok(Self {
            dir,
            snapshots,
            outputs,
            last_build,
        })
    }

    /// Directory the cache lives in.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// The snapshot map.
    #[must_use]
    pub fn snapshots(&self) -> &FileSnapshotMap {
        &self.snapshots
    }

    /// The snapshot map, mutably.
    pub fn snapshots_mut(&mut self) -> &mut FileSnapshotMap {
        &mut self.snapshots
    }

    /// The source-to-outputs map.
    #[must_use]
    pub fn outputs(&self) -> &OutputsMap {
        &self.outputs
    }

    /// The source-to-outputs map, mutably.
    pub fn outputs_mut(&mut self) -> &mut OutputsMap {
        &mut self.outputs
    }

    /// Info recorded by the previous build, if it left a readable record.
    #[must_use]
    pub fn last_build_info(&self) -> Option<BuildInfo> {
        self.last_build
    }

    /// Persist `info` as this build's record.
    ///
    /// Written in place without a rename: a torn record is read back as
    /// `None`, which is the same as not having one.
    pub fn write_build_info(&self, info: &BuildInfo) -> Result<(), StoreError> {
        let path = self.dir.join(BUILD_INFO_FILE);
        let bytes = bincode::serialize(info)
            .map_err(|e| StoreError::io(&path, io::Error::other(e)))?;
        fs::write(&path, bytes).map_err(|e| StoreError::io(&path, e))
    }

    /// Flush every owned map that has pending changes, or all of them
    /// when `forced`.
    pub fn flush(&mut self, forced: bool) -> Result<(), StoreError> {
        self.snapshots.flush(forced)?;
        self.outputs.flush(forced)?;
        Ok(())
    }

    /// Flush and release every owned map, aggregating failures.
    ///
    /// A failure in one map never prevents the others from closing.
    pub fn close(self) -> Result<(), StoreError> {
        let mut failures = Vec::new();
        if let Err(e) = self.snapshots.close() {
            failures.push(e);
        }
        if let Err(e) = self.outputs.close() {
            failures.push(e);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(StoreError::CloseFailed { failures })
        }
    }
}
