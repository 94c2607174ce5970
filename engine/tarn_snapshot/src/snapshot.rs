//! The per-file snapshot value.
//!
//! A [`FileSnapshot`] captures one file's fingerprint at a point in time:
//! its size, its last-modified time, and a whole-content digest. Snapshots
//! are immutable values: computed fresh, compared against a stored
//! predecessor, then persisted or discarded.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::digest::ContentDigest;

/// Fingerprint of one file's content and metadata.
///
/// # Equality
///
/// Equality compares `size` and `digest` only. The timestamp is advisory:
/// it is persisted and refreshed on every commit, and metadata-based fast
/// paths use it to skip re-hashing, but a file rewritten with identical
/// content compares equal to its earlier snapshot even though the stored
/// mtime differs. Change detection therefore never reports content-identical
/// rewrites as modifications.
#[derive(Debug, Clone, Copy)]
pub struct FileSnapshot {
    /// File size in bytes.
    pub size: u64,
    /// Last-modified time in milliseconds since the Unix epoch.
    pub mtime_ms: i64,
    /// Digest of the entire file content.
    pub digest: ContentDigest,
}

impl FileSnapshot {
    /// Create a snapshot from its parts.
    #[must_use]
    pub const fn new(size: u64, mtime_ms: i64, digest: ContentDigest) -> Self {
        Self {
            size,
            mtime_ms,
            digest,
        }
    }

    /// Metadata-level comparison: true when size and mtime both match.
    ///
    /// A `true` result makes an unchanged content digest very likely (good
    /// enough for a re-hash fast path); `false` proves nothing either way.
    #[must_use]
    pub fn same_metadata(&self, other: &Self) -> bool {
        self.size == other.size && self.mtime_ms == other.mtime_ms
    }
}

impl PartialEq for FileSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.digest == other.digest
    }
}

impl Eq for FileSnapshot {}

/// Convert a filesystem timestamp to milliseconds since the Unix epoch.
///
/// Pre-epoch times map to negative values; out-of-range magnitudes saturate
/// instead of panicking.
#[must_use]
pub fn epoch_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => i64::try_from(since.as_millis()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_millis()).map_or(i64::MIN, |ms| -ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::digest_bytes;
    use std::time::Duration;

    #[test]
    fn test_equality_ignores_timestamp() {
        let digest = digest_bytes(b"same content");
        let early = FileSnapshot::new(12, 1_000, digest);
        let late = FileSnapshot::new(12, 99_000, digest);

        assert_eq!(early, late);
    }

    #[test]
    fn test_size_change_breaks_equality() {
        let digest = digest_bytes(b"content");
        let a = FileSnapshot::new(7, 1_000, digest);
        let b = FileSnapshot::new(8, 1_000, digest);

        assert_ne!(a, b);
    }

    #[test]
    fn test_digest_change_breaks_equality() {
        let a = FileSnapshot::new(7, 1_000, digest_bytes(b"alpha 1"));
        let b = FileSnapshot::new(7, 1_000, digest_bytes(b"alpha 2"));

        assert_ne!(a, b);
    }

    #[test]
    fn test_same_metadata() {
        let a = FileSnapshot::new(7, 1_000, digest_bytes(b"alpha 1"));
        let b = FileSnapshot::new(7, 1_000, digest_bytes(b"alpha 2"));
        let c = FileSnapshot::new(7, 2_000, digest_bytes(b"alpha 1"));

        assert!(a.same_metadata(&b));
        assert!(!a.same_metadata(&c));
    }

    #[test]
    fn test_epoch_millis() {
        assert_eq!(epoch_millis(UNIX_EPOCH), 0);
        assert_eq!(epoch_millis(UNIX_EPOCH + Duration::from_millis(1_500)), 1_500);
        assert_eq!(epoch_millis(UNIX_EPOCH - Duration::from_secs(2)), -2_000);
    }
}
