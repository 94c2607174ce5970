//! Change-set result type.

use std::path::PathBuf;

/// Paths whose state changed relative to the previously stored snapshots.
///
/// `removed` and `modified` are disjoint: a path is either gone from the
/// current set or present with different content, never both. Unchanged
/// paths appear in neither list. Entry order is unspecified; callers that
/// need determinism sort before display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Previously tracked files absent from the current set.
    pub removed: Vec<PathBuf>,
    /// Files that are new, or whose stored snapshot no longer matches.
    pub modified: Vec<PathBuf>,
}

impl SnapshotDiff {
    /// An empty diff.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            removed: Vec::new(),
            modified: Vec::new(),
        }
    }

    /// True when nothing was removed or modified.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.removed.is_empty() && self.modified.is_empty()
    }
}
