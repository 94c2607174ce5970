//! Durable snapshot storage and change detection for incremental builds.
//!
//! This crate is the persistence half of the snapshot engine: it stores
//! the [`FileSnapshot`](tarn_snapshot::FileSnapshot) values computed by
//! `tarn_snapshot` across builds and answers "what changed since last
//! time" through [`FileSnapshotMap::compare_and_update`]. Alongside the
//! snapshots it tracks which outputs each source produced, so a driver can
//! clean up after deleted or recompiled sources.
//!
//! # Cache Directory Structure
//!
//! One build keeps its state under a single cache directory, owned by
//! [`InputsCache`]:
//!
//! ```text
//! <cache-dir>/
//! ├── file-snapshots.tab    FileSnapshotMap   path key → FileSnapshot
//! ├── source-outputs.tab    OutputsMap        source key → output paths
//! └── last-build.bin        BuildInfo         previous build's record
//! ```
//!
//! The `.tab` tables share one container format: a magic plus format
//! version, an entry count, and fixed-layout entries with no delimiters.
//! Writes go through a temp file and an atomic rename, so a crash leaves
//! either the old table or the new one, never a torn mix.
//!
//! # Failure Policy
//!
//! Stored state is an optimization, never a source of truth. A corrupt
//! table is logged, counted, and replaced by the empty state, which makes
//! the next comparison report every file as modified (a full rebuild).
//! Only explicitly requested durability (`flush`, `close`) surfaces I/O
//! errors to the caller.
//!
//! Keys are produced by a pluggable [`FileToPathConverter`]; with the
//! relocatable converter the whole cache survives the project tree moving
//! to a different checkout path.

pub mod context;
pub mod error;
pub mod externalize;
pub mod inputs_cache;
pub mod outputs_map;
pub mod paths;
pub mod persistent;
pub mod snapshot_map;

pub use context::{BuildMetrics, MetricsReport, StoreContext};
pub use error::StoreError;
pub use externalize::{
    Externalizer, I64Externalizer, PathListExternalizer, SnapshotExternalizer, StringExternalizer,
    U64Externalizer,
};
pub use inputs_cache::{BuildInfo, InputsCache, BUILD_INFO_FILE, OUTPUTS_FILE, SNAPSHOTS_FILE};
pub use outputs_map::OutputsMap;
pub use paths::{AbsolutePathConverter, FileToPathConverter, RelocatablePathConverter};
pub use persistent::PersistentMap;
pub use snapshot_map::FileSnapshotMap;
