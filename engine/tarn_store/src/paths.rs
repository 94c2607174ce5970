//! Path-to-key conversion strategies.
//!
//! Storage never keys by `PathBuf` directly: an injected converter decides
//! the canonical string form, which is what lands in the backing file. The
//! choice of converter decides whether a persisted map survives a project
//! tree being moved.

use std::fmt;
use std::path::{Path, PathBuf};

/// Converts between files and their canonical string keys in storage.
///
/// Both directions are pure functions of the input and the converter's own
/// configuration. No filesystem access, no symlink resolution: keys must be
/// computable for files that no longer exist, since removed files are looked
/// up by key long after deletion.
pub trait FileToPathConverter: fmt::Debug + Send + Sync {
    /// Canonical storage key for `path`.
    fn to_key(&self, path: &Path) -> String;

    /// Reconstruct the file a stored `key` refers to.
    fn to_file(&self, key: &str) -> PathBuf;
}

/// Keys are the path's own string form.
///
/// Simple and exact, but a persisted map keyed this way is pinned to the
/// directory layout it was written under.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsolutePathConverter;

impl FileToPathConverter for AbsolutePathConverter {
    fn to_key(&self, path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    fn to_file(&self, key: &str) -> PathBuf {
        PathBuf::from(key)
    }
}

/// Keys are root-relative with `/` separators.
///
/// Two checkouts of the same tree under different roots produce identical
/// keys, so a persisted map moves with its project. Paths outside the root
/// fall back to their absolute form.
#[derive(Debug, Clone)]
pub struct RelocatablePathConverter {
    root: PathBuf,
}

impl RelocatablePathConverter {
    /// Converter relative to `root` (typically the project directory).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root the keys are relative to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileToPathConverter for RelocatablePathConverter {
    fn to_key(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(relative) => {
                let mut key = String::new();
                for component in relative.components() {
                    if !key.is_empty() {
                        key.push('/');
                    }
                    key.push_str(&component.as_os_str().to_string_lossy());
                }
                key
            }
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }

    fn to_file(&self, key: &str) -> PathBuf {
        if Path::new(key).is_absolute() {
            PathBuf::from(key)
        } else {
            self.root.join(key)
        }
    }
}
