//! Content digests for file change detection.
//!
//! A digest is the whole-file fingerprint stored inside a [`FileSnapshot`]
//! and persisted across builds, so the algorithm here is a stability
//! contract: the same bytes must produce the same digest on every platform,
//! in every process, in every release. The fold is the rotate-xor-multiply
//! byte mix used by rustc for incremental hashing; it is fast and well
//! distributed but deliberately not cryptographic (nothing here defends
//! against adversarial collisions).
//!
//! The fold consumes input byte by byte, so feeding the same content in
//! different chunk sizes yields the same digest. File readers rely on this:
//! a streamed 8 KiB-buffered read and an in-memory slice hash agree.
//!
//! [`FileSnapshot`]: crate::FileSnapshot

use std::ops::BitXor;

/// A 64-bit digest of a file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest(u64);

impl ContentDigest {
    /// Create a digest from a raw u64 value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the underlying digest value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Format as a 16-digit lowercase hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        u64::from_str_radix(s, 16).ok().map(Self)
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Incremental digest state for streamed input.
///
/// Feed bytes with [`update`](Self::update) in any chunking; the result
/// depends only on the byte sequence.
#[derive(Debug, Default)]
pub struct DigestBuilder {
    state: u64,
}

impl DigestBuilder {
    const K: u64 = 0x517c_c1b7_2722_0a95;

    /// Create an empty digest state.
    #[must_use]
    pub const fn new() -> Self {
        Self { state: 0 }
    }

    /// Fold `bytes` into the digest, one byte at a time.
    pub fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state = self
                .state
                .rotate_left(5)
                .bitxor(u64::from(byte))
                .wrapping_mul(Self::K);
        }
    }

    /// Fold a u64 into the digest as its big-endian bytes.
    pub fn update_u64(&mut self, value: u64) {
        self.update(&value.to_be_bytes());
    }

    /// Finish and produce the digest.
    #[must_use]
    pub const fn finish(&self) -> ContentDigest {
        ContentDigest(self.state)
    }
}

/// Digest a byte slice in one call.
#[must_use]
pub fn digest_bytes(data: &[u8]) -> ContentDigest {
    let mut builder = DigestBuilder::new();
    builder.update(data);
    builder.finish()
}

/// Combine several digests into one. Order-sensitive.
#[must_use]
pub fn combine_digests(digests: &[ContentDigest]) -> ContentDigest {
    let mut builder = DigestBuilder::new();
    for digest in digests {
        builder.update_u64(digest.value());
    }
    builder.finish()
}
