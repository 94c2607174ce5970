//! Generic durable map with an in-memory image.
//!
//! All reads and writes happen against a plain hash map in memory; the disk
//! only sees whole-image writes at flush time. That keeps mutation
//! infallible for callers and makes durability an explicit, coarse event
//! rather than a per-operation cost.
//!
//! # Backing file layout
//!
//! ```text
//! magic    4 bytes   b"TARN"
//! version  u32 BE    format version (currently 1)
//! count    u32 BE    number of entries
//! entries  count × (key, value)   via the externalizers, no delimiters
//! ```
//!
//! Opening a path with no backing file yields an empty map (a first build
//! sees every file as new). Anything else wrong with the file, from bad
//! magic to a record cut short to trailing garbage, is `StoreError::Corrupt`
//! for the whole file; there is no partial-record recovery.
//!
//! Flushing serializes the entire image to `<path>.tmp` and atomically
//! renames it over the backing file, so a crash mid-write leaves the
//! previous state intact. One map instance belongs to one build process;
//! cross-process exclusion is the caller's concern.

use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::hash::Hash;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::externalize::{read_u32, Externalizer};

pub(crate) const MAGIC: [u8; 4] = *b"TARN";
pub(crate) const FORMAT_VERSION: u32 = 1;

/// A durable key-value map: in-memory image, explicit flush, consuming
/// close.
#[derive(Debug)]
pub struct PersistentMap<K, V, KE, VE> {
    path: PathBuf,
    image: FxHashMap<K, V>,
    dirty: bool,
    key_ext: KE,
    value_ext: VE,
}

impl<K, V, KE, VE> PersistentMap<K, V, KE, VE>
where
    K: Eq + Hash,
    KE: Externalizer<K>,
    VE: Externalizer<V>,
{
    /// Open the map at `path`, reading the backing file if one exists.
    ///
    /// A missing file is an empty map. A file that exists but cannot be
    /// parsed is [`StoreError::Corrupt`]; callers that prefer recovery over
    /// failure use [`open_or_reset`](Self::open_or_reset).
    pub fn open(path: impl Into<PathBuf>, key_ext: KE, value_ext: VE) -> Result<Self, StoreError> {
        let path = path.into();
        let image = match File::open(&path) {
            Ok(file) => Self::read_image(&path, file, &key_ext, &value_ext)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => FxHashMap::default(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        Ok(Self {
            path,
            image,
            dirty: false,
            key_ext,
            value_ext,
        })
    }

    /// A map with an empty image at `path`, ignoring any backing file.
    ///
    /// Starts dirty, so the next flush replaces whatever is on disk.
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>, key_ext: KE, value_ext: VE) -> Self {
        Self {
            path: path.into(),
            image: FxHashMap::default(),
            dirty: true,
            key_ext,
            value_ext,
        }
    }

    /// Open `path`, falling back to a fresh empty map when the backing file
    /// is corrupt.
    ///
    /// On recovery the corrupt file is removed best-effort (the empty map
    /// starts dirty, so the next flush replaces it either way) and the
    /// corruption reason is returned for the caller to log and count.
    pub fn open_or_reset(
        path: impl Into<PathBuf>,
        key_ext: KE,
        value_ext: VE,
    ) -> Result<(Self, Option<String>), StoreError>
    where
        KE: Clone,
        VE: Clone,
    {
        let path = path.into();
        match Self::open(path.clone(), key_ext.clone(), value_ext.clone()) {
            Ok(map) => Ok((map, None)),
            Err(StoreError::Corrupt { reason, .. }) => {
                if let Err(e) = fs::remove_file(&path) {
                    if e.kind() != io::ErrorKind::NotFound {
                        tracing::debug!(
                            path = %path.display(),
                            error = %e,
                            "could not remove corrupt storage file"
                        );
                    }
                }
                Ok((Self::empty(path, key_ext, value_ext), Some(reason)))
            }
            Err(other) => Err(other),
        }
    }

    fn read_image(
        path: &Path,
        file: File,
        key_ext: &KE,
        value_ext: &VE,
    ) -> Result<FxHashMap<K, V>, StoreError> {
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| StoreError::corrupt(path, format!("unreadable header: {e}")))?;
        if magic != MAGIC {
            return Err(StoreError::corrupt(path, "bad magic"));
        }

        let version = read_u32(&mut reader)
            .map_err(|e| StoreError::corrupt(path, format!("unreadable version: {e}")))?;
        if version != FORMAT_VERSION {
            return Err(StoreError::corrupt(
                path,
                format!("unsupported format version {version}"),
            ));
        }

        let count = read_u32(&mut reader)
            .map_err(|e| StoreError::corrupt(path, format!("unreadable entry count: {e}")))?;

        // No reserve from the untrusted count; a lying header fails on EOF
        // below instead of ballooning memory.
        let mut image = FxHashMap::default();
        for index in 0..count {
            let key = key_ext
                .read(&mut reader)
                .map_err(|e| StoreError::corrupt(path, format!("entry {index} key: {e}")))?;
            let value = value_ext
                .read(&mut reader)
                .map_err(|e| StoreError::corrupt(path, format!("entry {index} value: {e}")))?;
            image.insert(key, value);
        }

        let mut probe = [0u8; 1];
        match reader.read(&mut probe) {
            Ok(0) => {}
            Ok(_) => return Err(StoreError::corrupt(path, "trailing bytes after last entry")),
            Err(e) => return Err(StoreError::corrupt(path, format!("unreadable tail: {e}"))),
        }

        Ok(image)
    }

    /// Stored value for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.image.get(key)
    }

    /// True when `key` has a stored value.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.image.contains_key(key)
    }

    /// Insert or overwrite, marking the map dirty even when the value is
    /// unchanged (storage commits refresh advisory fields).
    pub fn insert(&mut self, key: K, value: V) {
        self.image.insert(key, value);
        self.dirty = true;
    }

    /// Remove `key`, marking the map dirty when an entry existed.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let removed = self.image.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Iterate over stored keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.image.keys()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.image.len()
    }

    /// True when no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }

    /// True when the image has changes the backing file has not seen.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Location of the backing file.
    #[must_use]
    pub fn storage_path(&self) -> &Path {
        &self.path
    }

    /// Write the image out if it is dirty, or unconditionally when
    /// `forced`.
    ///
    /// The image is serialized to a sibling `.tmp` file, synced, then
    /// atomically renamed over the backing file. Returns whether a write
    /// happened.
    pub fn flush(&mut self, forced: bool) -> Result<bool, StoreError> {
        if !self.dirty && !forced {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let file = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        let mut writer = BufWriter::new(file);

        writer
            .write_all(&MAGIC)
            .map_err(|e| StoreError::io(&tmp, e))?;
        writer
            .write_all(&FORMAT_VERSION.to_be_bytes())
            .map_err(|e| StoreError::io(&tmp, e))?;

        let count = u32::try_from(self.image.len()).map_err(|_| {
            StoreError::io(
                &self.path,
                io::Error::new(io::ErrorKind::InvalidInput, "more than u32::MAX entries"),
            )
        })?;
        writer
            .write_all(&count.to_be_bytes())
            .map_err(|e| StoreError::io(&tmp, e))?;

        for (key, value) in &self.image {
            self.key_ext
                .save(&mut writer, key)
                .map_err(|e| StoreError::io(&tmp, e))?;
            self.value_ext
                .save(&mut writer, value)
                .map_err(|e| StoreError::io(&tmp, e))?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| StoreError::io(&tmp, e.into_error()))?;
        file.sync_all().map_err(|e| StoreError::io(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
        self.dirty = false;
        Ok(true)
    }

    /// Flush pending changes and release the map.
    ///
    /// Consuming `self` makes reuse after close a compile error rather than
    /// a runtime one.
    pub fn close(mut self) -> Result<(), StoreError> {
        self.flush(false)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
