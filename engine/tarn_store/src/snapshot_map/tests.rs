use super::*;
use crate::paths::RelocatablePathConverter;
use pretty_assertions::assert_eq;
use std::fs;
use tarn_snapshot::CachingSnapshotProvider;

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn sorted(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort();
    paths
}

fn open_map(storage: &Path, context: &StoreContext) -> FileSnapshotMap {
    FileSnapshotMap::open(storage, context).unwrap()
}

#[test]
fn test_first_build_reports_every_file_modified() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let b = write_file(dir.path(), "b.txt", "beta");
    let context = StoreContext::with_absolute_paths();
    let mut map = open_map(&dir.path().join("snap.tab"), &context);

    let diff = map.compare_and_update(vec![a.clone(), b.clone()]);

    assert_eq!(sorted(diff.modified), sorted(vec![a, b]));
    assert!(diff.removed.is_empty());
    assert_eq!(map.len(), 2);
}

#[test]
fn test_unchanged_files_produce_clean_diff() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let context = StoreContext::with_absolute_paths();
    let mut map = open_map(&dir.path().join("snap.tab"), &context);

    map.compare_and_update(vec![a.clone()]);
    let diff = map.compare_and_update(vec![a]);

    assert!(diff.is_clean());
}

#[test]
fn test_changed_content_is_reported_modified() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let context = StoreContext::with_absolute_paths();
    let mut map = open_map(&dir.path().join("snap.tab"), &context);
    map.compare_and_update(vec![a.clone()]);

    write_file(dir.path(), "a.txt", "ALPHA");
    let diff = map.compare_and_update(vec![a.clone()]);

    assert_eq!(diff.modified, vec![a]);
    assert!(diff.removed.is_empty());
}

#[test]
fn test_rewrite_with_identical_content_is_not_a_change() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let context = StoreContext::with_absolute_paths();
    let mut map = open_map(&dir.path().join("snap.tab"), &context);
    map.compare_and_update(vec![a.clone()]);

    // A rewrite bumps the timestamp but leaves size and digest alone.
    write_file(dir.path(), "a.txt", "alpha");
    let diff = map.compare_and_update(vec![a]);

    assert!(diff.is_clean());
}

#[test]
fn test_new_file_is_reported_modified() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let context = StoreContext::with_absolute_paths();
    let mut map = open_map(&dir.path().join("snap.tab"), &context);
    map.compare_and_update(vec![a.clone()]);

    let b = write_file(dir.path(), "b.txt", "beta");
    let diff = map.compare_and_update(vec![a, b.clone()]);

    assert_eq!(diff.modified, vec![b]);
    assert!(diff.removed.is_empty());
}

#[test]
fn test_deleted_file_is_reported_removed() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let b = write_file(dir.path(), "b.txt", "beta");
    let context = StoreContext::with_absolute_paths();
    let mut map = open_map(&dir.path().join("snap.tab"), &context);
    map.compare_and_update(vec![a.clone(), b.clone()]);

    fs::remove_file(&a).unwrap();
    let diff = map.compare_and_update(vec![b]);

    assert_eq!(diff.removed, vec![a.clone()]);
    assert!(diff.modified.is_empty());
    assert_eq!(map.stored(&a), None);
    assert_eq!(map.len(), 1);
}

#[test]
fn test_absent_path_in_input_is_treated_like_deletion() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let context = StoreContext::with_absolute_paths();
    let mut map = open_map(&dir.path().join("snap.tab"), &context);
    map.compare_and_update(vec![a.clone()]);

    // The file is gone from disk but the caller still lists it.
    fs::remove_file(&a).unwrap();
    let diff = map.compare_and_update(vec![a.clone()]);

    assert_eq!(diff.removed, vec![a]);
    assert!(diff.modified.is_empty());
    assert!(map.is_empty());
}

#[test]
fn test_unreadable_entry_is_skipped_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let not_a_file = dir.path().join("subdir");
    fs::create_dir(&not_a_file).unwrap();
    let context = StoreContext::with_absolute_paths();
    let mut map = open_map(&dir.path().join("snap.tab"), &context);

    let diff = map.compare_and_update(vec![a.clone(), not_a_file.clone()]);

    assert_eq!(diff.modified, vec![a]);
    assert!(diff.removed.is_empty());
    assert_eq!(map.stored(&not_a_file), None);
    assert_eq!(context.metrics.report().unreadable_files, 1);
}

#[test]
fn test_unchanged_commit_still_marks_dirty() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let context = StoreContext::with_absolute_paths();
    let mut map = open_map(&dir.path().join("snap.tab"), &context);
    map.compare_and_update(vec![a.clone()]);
    map.flush(false).unwrap();
    assert!(!map.is_dirty());

    let diff = map.compare_and_update(vec![a]);

    // Even a clean diff rewrites every entry to refresh timestamps.
    assert!(diff.is_clean());
    assert!(map.is_dirty());
}

#[test]
fn test_flush_then_reopen_preserves_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let storage = dir.path().join("snap.tab");
    let context = StoreContext::with_absolute_paths();

    let mut map = open_map(&storage, &context);
    map.compare_and_update(vec![a.clone()]);
    map.flush(false).unwrap();
    drop(map);

    let mut reopened = open_map(&storage, &context);
    assert_eq!(reopened.len(), 1);
    let diff = reopened.compare_and_update(vec![a]);
    assert!(diff.is_clean());
}

#[test]
fn test_close_flushes_pending_state() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let storage = dir.path().join("snap.tab");
    let context = StoreContext::with_absolute_paths();

    let mut map = open_map(&storage, &context);
    map.compare_and_update(vec![a.clone()]);
    map.close().unwrap();

    let mut reopened = open_map(&storage, &context);
    let diff = reopened.compare_and_update(vec![a]);
    assert!(diff.is_clean());
    assert_eq!(context.metrics.report().flushes, 1);
}

#[test]
fn test_corrupt_storage_recovers_with_full_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let storage = dir.path().join("snap.tab");
    fs::write(&storage, b"this is not a snapshot table").unwrap();
    let context = StoreContext::with_absolute_paths();

    let mut map = open_map(&storage, &context);
    assert!(map.is_empty());
    assert_eq!(context.metrics.report().storage_recoveries, 1);

    let diff = map.compare_and_update(vec![a.clone()]);
    assert_eq!(diff.modified, vec![a]);

    // The recovered map flushes back out as a valid table.
    map.close().unwrap();
    let reopened = open_map(&storage, &context);
    assert_eq!(reopened.len(), 1);
    assert_eq!(context.metrics.report().storage_recoveries, 1);
}

#[test]
fn test_removed_paths_resolve_through_converter() {
    let dir = tempfile::tempdir().unwrap();
    let old_root = dir.path().join("old");
    let new_root = dir.path().join("new");
    fs::create_dir_all(old_root.join("src")).unwrap();
    let storage = dir.path().join("snap.tab");
    let a = write_file(&old_root, "src/a.txt", "alpha");

    let old_context =
        StoreContext::new(Arc::new(RelocatablePathConverter::new(old_root.clone())));
    let mut map = open_map(&storage, &old_context);
    map.compare_and_update(vec![a]);
    map.close().unwrap();

    // Same table, project root moved: stale keys come back as paths
    // under the new root.
    let new_context =
        StoreContext::new(Arc::new(RelocatablePathConverter::new(new_root.clone())));
    let mut moved = open_map(&storage, &new_context);
    let diff = moved.compare_and_update(Vec::new());

    assert_eq!(diff.removed, vec![new_root.join("src/a.txt")]);
}

#[test]
fn test_metrics_track_the_commit() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let b = write_file(dir.path(), "b.txt", "beta");
    let context = StoreContext::with_absolute_paths();
    let mut map = open_map(&dir.path().join("snap.tab"), &context);

    map.compare_and_update(vec![a.clone(), b.clone()]);
    let after_first = context.metrics.report();
    assert_eq!(after_first.snapshots_computed, 2);
    assert_eq!(after_first.entries_written, 2);
    assert_eq!(after_first.entries_removed, 0);

    fs::remove_file(&b).unwrap();
    map.compare_and_update(vec![a]);
    let after_second = context.metrics.report();
    assert_eq!(after_second.snapshots_computed, 3);
    assert_eq!(after_second.entries_written, 3);
    assert_eq!(after_second.entries_removed, 1);
}

#[test]
fn test_custom_provider_is_used_for_hashing() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let context = StoreContext::with_absolute_paths();
    let mut map = FileSnapshotMap::open_with_provider(
        dir.path().join("snap.tab"),
        &context,
        Box::new(CachingSnapshotProvider::new()),
    )
    .unwrap();

    map.compare_and_update(vec![a.clone()]);
    let diff = map.compare_and_update(vec![a]);

    assert!(diff.is_clean());
    assert_eq!(context.metrics.report().snapshots_computed, 2);
}

#[test]
fn test_stored_reflects_latest_commit() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", "alpha");
    let context = StoreContext::with_absolute_paths();
    let mut map = open_map(&dir.path().join("snap.tab"), &context);

    assert_eq!(map.stored(&a), None);
    map.compare_and_update(vec![a.clone()]);
    assert_eq!(map.stored(&a).map(|s| s.size), Some(5));

    write_file(dir.path(), "a.txt", "alphabet");
    map.compare_and_update(vec![a.clone()]);
    assert_eq!(map.stored(&a).map(|s| s.size), Some(8));
}
