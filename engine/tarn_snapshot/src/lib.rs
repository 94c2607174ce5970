//! File snapshotting and change-set computation for incremental builds.
//!
//! This crate is the in-memory half of the snapshot engine. It defines what
//! a file snapshot *is*, how one is computed from disk, and the change-set
//! type that comparison produces. Durable snapshot storage and the
//! compare-and-update operation live in `tarn_store`, which builds on these
//! types.
//!
//! # Overview
//!
//! Change detection works by:
//! 1. **Digesting content**: every tracked file's bytes run through a
//!    stable, non-cryptographic 64-bit fold.
//! 2. **Snapshotting**: size, mtime, and digest become an immutable
//!    [`FileSnapshot`] value.
//! 3. **Comparing**: fresh snapshots against stored ones yield a
//!    [`SnapshotDiff`] of removed and modified paths.
//!
//! # Pipeline
//!
//! ```text
//! paths (from the build driver)
//!   │
//!   ▼
//! SnapshotProvider ──► DigestBuilder ──► FileSnapshot { size, mtime_ms, digest }
//!                                          │
//!                  stored state (tarn_store)
//!                                          ▼
//!                        SnapshotDiff { removed, modified }
//! ```
//!
//! # Equality
//!
//! Snapshot equality compares size and digest only. The timestamp is
//! advisory: it rides along for metadata fast paths but never decides
//! whether a file counts as modified, so content-identical rewrites stay
//! out of the change set.

pub mod diff;
pub mod digest;
pub mod provider;
pub mod snapshot;

pub use diff::SnapshotDiff;
pub use digest::{combine_digests, digest_bytes, ContentDigest, DigestBuilder};
pub use provider::{
    snapshot_file, snapshot_files, CachingSnapshotProvider, SnapshotError, SnapshotProvider,
    StreamingSnapshotProvider,
};
pub use snapshot::{epoch_millis, FileSnapshot};
