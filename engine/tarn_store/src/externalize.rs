//! Fixed-layout binary encode/decode for persisted values.
//!
//! Every record in a persistent map goes through an [`Externalizer`]: one
//! implementation owning both directions of a value's wire format, so the
//! writer and the reader of a layout can never drift apart. The layouts are
//! persistence contracts:
//!
//! - integers are fixed-width big-endian, no delimiters;
//! - strings are a u32 byte count followed by UTF-8 bytes;
//! - a [`FileSnapshot`] is exactly 24 bytes: size, mtime, digest.
//!
//! Nothing depends on platform endianness or locale. A file written by one
//! process reads identically in any other, which is what lets snapshot
//! state survive across build daemons.
//!
//! Read failures come back as `UnexpectedEof` (short input) or
//! `InvalidData` (malformed content); the persistent map treats either as
//! whole-file corruption, never as a partially usable record.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tarn_snapshot::{ContentDigest, FileSnapshot};

use crate::paths::FileToPathConverter;

/// Paired binary encode/decode for one value type.
pub trait Externalizer<T> {
    /// Write `value` to `out` in the fixed layout.
    fn save(&self, out: &mut dyn Write, value: &T) -> io::Result<()>;

    /// Read one value back from `input`.
    fn read(&self, input: &mut dyn Read) -> io::Result<T>;
}

pub(crate) fn read_u32(input: &mut dyn Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u64(input: &mut dyn Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

fn read_i64(input: &mut dyn Read) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(i64::from_be_bytes(buf))
}

fn length_prefix(len: usize) -> io::Result<u32> {
    u32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds u32::MAX"))
}

/// u64 as 8 big-endian bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct U64Externalizer;

impl Externalizer<u64> for U64Externalizer {
    fn save(&self, out: &mut dyn Write, value: &u64) -> io::Result<()> {
        out.write_all(&value.to_be_bytes())
    }

    fn read(&self, input: &mut dyn Read) -> io::Result<u64> {
        read_u64(input)
    }
}

/// i64 as 8 big-endian bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct I64Externalizer;

impl Externalizer<i64> for I64Externalizer {
    fn save(&self, out: &mut dyn Write, value: &i64) -> io::Result<()> {
        out.write_all(&value.to_be_bytes())
    }

    fn read(&self, input: &mut dyn Read) -> io::Result<i64> {
        read_i64(input)
    }
}

/// Length-prefixed UTF-8: u32 byte count, then the bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringExternalizer;

impl Externalizer<String> for StringExternalizer {
    fn save(&self, out: &mut dyn Write, value: &String) -> io::Result<()> {
        let bytes = value.as_bytes();
        out.write_all(&length_prefix(bytes.len())?.to_be_bytes())?;
        out.write_all(bytes)
    }

    fn read(&self, input: &mut dyn Read) -> io::Result<String> {
        let len = read_u32(input)?;

        // Read through a bounded adapter rather than preallocating from an
        // untrusted length: a corrupt prefix claiming 4 GiB then fails on
        // EOF instead of ballooning memory.
        let mut bytes = Vec::new();
        (&mut *input).take(u64::from(len)).read_to_end(&mut bytes)?;
        if bytes.len() != len as usize {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "string shorter than its length prefix",
            ));
        }

        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// The 24-byte snapshot record.
///
/// ```text
/// size     u64 BE   8 bytes
/// mtime_ms i64 BE   8 bytes
/// digest   u64 BE   8 bytes
/// ```
///
/// The timestamp is advisory for comparison purposes but is still
/// persisted bit-for-bit; round-tripping preserves the entire value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotExternalizer;

impl Externalizer<FileSnapshot> for SnapshotExternalizer {
    fn save(&self, out: &mut dyn Write, value: &FileSnapshot) -> io::Result<()> {
        U64Externalizer.save(out, &value.size)?;
        I64Externalizer.save(out, &value.mtime_ms)?;
        U64Externalizer.save(out, &value.digest.value())
    }

    fn read(&self, input: &mut dyn Read) -> io::Result<FileSnapshot> {
        let size = U64Externalizer.read(input)?;
        let mtime_ms = I64Externalizer.read(input)?;
        let digest = ContentDigest::new(U64Externalizer.read(input)?);
        Ok(FileSnapshot::new(size, mtime_ms, digest))
    }
}

/// Path lists: u32 count, then each path as its converter key in the
/// string layout.
///
/// Paths cross the path-to-key conversion on both directions, so a list
/// persisted under a relocatable converter moves with the project tree
/// just like map keys do.
#[derive(Debug, Clone)]
pub struct PathListExternalizer {
    converter: Arc<dyn FileToPathConverter>,
}

impl PathListExternalizer {
    /// Externalizer writing keys produced by `converter`.
    #[must_use]
    pub fn new(converter: Arc<dyn FileToPathConverter>) -> Self {
        Self { converter }
    }
}

impl Externalizer<Vec<PathBuf>> for PathListExternalizer {
    fn save(&self, out: &mut dyn Write, value: &Vec<PathBuf>) -> io::Result<()> {
        out.write_all(&length_prefix(value.len())?.to_be_bytes())?;
        for path in value {
            StringExternalizer.save(out, &self.converter.to_key(path))?;
        }
        Ok(())
    }

    fn read(&self, input: &mut dyn Read) -> io::Result<Vec<PathBuf>> {
        let count = read_u32(input)?;
        let mut paths = Vec::new();
        for _ in 0..count {
            let key = StringExternalizer.read(input)?;
            paths.push(self.converter.to_file(&key));
        }
        Ok(paths)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
