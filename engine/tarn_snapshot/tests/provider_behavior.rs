//! Behavior tests for the public snapshot API.
//!
//! Everything here goes through the crate root exports, the way a build
//! driver consumes this crate: batch hashing agrees with single-file
//! hashing, and snapshot equality tracks content rather than timestamps.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tarn_snapshot::{
    digest_bytes, snapshot_file, snapshot_files, ContentDigest, SnapshotProvider,
    StreamingSnapshotProvider,
};

#[test]
fn parallel_batch_agrees_with_sequential() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..16 {
        let path = dir.path().join(format!("mod_{i}.ori"));
        fs::write(&path, format!("@id_{i} () -> int = {i}")).unwrap();
        paths.push(path);
    }

    let parallel = snapshot_files(&paths);

    assert_eq!(parallel.len(), paths.len());
    for (i, (path, result)) in parallel.iter().enumerate() {
        assert_eq!(*path, paths[i]);
        assert_eq!(*result.as_ref().unwrap(), snapshot_file(path).unwrap());
    }
}

#[test]
fn rewrite_with_same_content_is_not_a_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.ori");
    fs::write(&path, "@retries () -> int = 3").unwrap();

    let mut provider = StreamingSnapshotProvider;
    let before = provider.snapshot(&path).unwrap();

    std::thread::sleep(Duration::from_millis(30));
    fs::write(&path, "@retries () -> int = 3").unwrap();
    let after = provider.snapshot(&path).unwrap();

    assert_eq!(before, after);
}

#[test]
fn digest_survives_hex_round_trip() {
    let digest = digest_bytes(b"@entry () -> void = ()\n");
    let hex = digest.to_hex();

    assert_eq!(hex.len(), 16);
    assert_eq!(ContentDigest::from_hex(&hex), Some(digest));
}

#[test]
fn batch_reports_each_missing_file_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let present = dir.path().join("here.ori");
    fs::write(&present, "@here () -> int = 0").unwrap();

    let paths: Vec<PathBuf> = vec![
        dir.path().join("gone_a.ori"),
        present.clone(),
        dir.path().join("gone_b.ori"),
    ];
    let results = snapshot_files(&paths);

    assert!(results[0].1.as_ref().unwrap_err().is_not_found());
    assert!(results[1].1.is_ok());
    assert!(results[2].1.as_ref().unwrap_err().is_not_found());
}
