//! Error taxonomy for the storage layer.
//!
//! Two rules shape this enum. Decode failures are never partial: anything
//! wrong with a backing file, from a bad magic to a record cut short, is
//! [`StoreError::Corrupt`] for the whole file. And storage failures must
//! never take the build down with them: callers recover from `Corrupt` by
//! starting from the empty state, which costs one full rebuild and nothing
//! else.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error from persistent map operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure while creating, writing, or replacing a storage file.
    #[error("storage I/O error at '{}': {source}", path.display())]
    Io {
        /// File or directory the operation touched.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Backing file exists but cannot be understood.
    ///
    /// Covers bad magic, unsupported format versions, malformed records,
    /// and truncation.
    #[error("storage corrupt at '{}': {reason}", path.display())]
    Corrupt {
        /// The unreadable file.
        path: PathBuf,
        /// What failed to parse.
        reason: String,
    },
    /// One or more maps failed while closing.
    #[error("failed to close {} map(s): {}", failures.len(), summarize(failures))]
    CloseFailed {
        /// Every per-map failure, in close order.
        failures: Vec<StoreError>,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// True for the unreadable-backing-file case.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

fn summarize(failures: &[StoreError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
