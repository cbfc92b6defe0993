//! Integration tests exercising the public API end-to-end: layering a
//! [`FakeBackend`] with `WalkLayer`, `CaseLayer`, and `MtimeLayer` the way
//! a caller actually would, rather than poking at one module in isolation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use syncvfs_core::fake::{FakeBackend, FakeBackendConfig};
use syncvfs_core::{
    CancelToken, CaseLayerBuilder, FileMode, FileSystem, FsError, LayerExt, MemoryDatabase,
    MtimeLayerBuilder, NoopIgnore, WalkAction, WalkLayerBuilder, MAX_TEMP_NAME_LEN,
};

fn case_insensitive_backend() -> FakeBackend {
    FakeBackend::with_config(FakeBackendConfig {
        case_insensitive: true,
        ..Default::default()
    })
}

#[test]
fn case_layer_rejects_a_mismatched_case_conflict() {
    let backend = case_insensitive_backend();
    let fs = backend.layer(CaseLayerBuilder);
    fs.mkdir_all(Path::new("Reports/Q1"), FileMode::default_dir()).unwrap();

    // The inner backend is case-insensitive, so "reports/q1" resolves to
    // the same node as "Reports/Q1" - but the spelling doesn't match what's
    // on disk.
    let err = fs.stat(Path::new("reports/q1")).unwrap_err();
    match err {
        FsError::CaseConflict { given, real } => {
            assert_eq!(given, PathBuf::from("reports/q1"));
            assert_eq!(real, PathBuf::from("Reports/Q1"));
        }
        other => panic!("expected CaseConflict, got {other:?}"),
    }
}

#[test]
fn case_layer_allows_exact_spelling_through() {
    let backend = case_insensitive_backend();
    let fs = backend.layer(CaseLayerBuilder);
    fs.mkdir_all(Path::new("Reports/Q1"), FileMode::default_dir()).unwrap();

    assert!(fs.stat(Path::new("Reports/Q1")).unwrap().is_dir());
}

#[test]
fn walk_layer_visits_parents_before_children_in_sorted_order() {
    let fs = FakeBackend::new().layer(WalkLayerBuilder);
    fs.mkdir_all(Path::new("a/b/c"), FileMode::default_dir()).unwrap();
    fs.create(Path::new("a/z.txt")).unwrap();
    fs.create(Path::new("a/b/m.txt")).unwrap();

    let mut order = Vec::new();
    fs.walk(Path::new("."), &mut |path, _info| {
        order.push(path.to_path_buf());
        Ok(WalkAction::Continue)
    })
    .unwrap();

    let a_pos = order.iter().position(|p| p == Path::new("a")).unwrap();
    let ab_pos = order.iter().position(|p| p == Path::new("a/b")).unwrap();
    let abc_pos = order.iter().position(|p| p == Path::new("a/b/c")).unwrap();
    assert!(a_pos < ab_pos);
    assert!(ab_pos < abc_pos);

    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);
}

#[test]
fn walk_layer_orders_dot_suffixed_path_before_its_plain_counterpart() {
    let fs = FakeBackend::new().layer(WalkLayerBuilder);
    fs.mkdir_all(Path::new("a.d"), FileMode::default_dir()).unwrap();
    fs.mkdir_all(Path::new("a"), FileMode::default_dir()).unwrap();
    fs.create(Path::new("a.d/x")).unwrap();
    fs.create(Path::new("a/x")).unwrap();

    let mut order = Vec::new();
    fs.walk(Path::new("."), &mut |path, _info| {
        order.push(path.to_path_buf());
        Ok(WalkAction::Continue)
    })
    .unwrap();

    let adx_pos = order.iter().position(|p| p == Path::new("a.d/x")).unwrap();
    let ax_pos = order.iter().position(|p| p == Path::new("a/x")).unwrap();
    assert!(adx_pos < ax_pos, "a.d/x must be visited before a/x");
}

#[test]
fn walk_layer_skip_dir_excludes_subtree_but_keeps_siblings() {
    let fs = FakeBackend::new().layer(WalkLayerBuilder);
    fs.mkdir_all(Path::new("skip/inner"), FileMode::default_dir()).unwrap();
    fs.create(Path::new("skip/inner/hidden.txt")).unwrap();
    fs.create(Path::new("visible.txt")).unwrap();

    let mut order = Vec::new();
    fs.walk(Path::new("."), &mut |path, _info| {
        order.push(path.to_path_buf());
        if path == Path::new("skip") {
            Ok(WalkAction::SkipDir)
        } else {
            Ok(WalkAction::Continue)
        }
    })
    .unwrap();

    assert!(order.contains(&Path::new("visible.txt").to_path_buf()));
    assert!(!order.iter().any(|p| p.starts_with("skip/inner")));
}

#[test]
fn mtime_layer_overlays_a_virtual_timestamp_and_survives_rename() {
    let backend = FakeBackend::new();
    backend.create(Path::new("note.txt")).unwrap();
    let database = Arc::new(MemoryDatabase::new());
    let fs = backend.layer(MtimeLayerBuilder::new(database));

    let desired = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
    fs.chtimes(Path::new("note.txt"), desired, desired).unwrap();
    assert_eq!(fs.stat(Path::new("note.txt")).unwrap().mtime(), desired);

    fs.rename(Path::new("note.txt"), Path::new("renamed.txt")).unwrap();
    assert_eq!(fs.stat(Path::new("renamed.txt")).unwrap().mtime(), desired);
}

#[test]
fn mtime_layer_drops_the_virtual_timestamp_once_the_file_is_rewritten() {
    let backend = FakeBackend::new();
    backend.create(Path::new("note.txt")).unwrap();
    let database = Arc::new(MemoryDatabase::new());
    let fs = backend.layer(MtimeLayerBuilder::new(database));

    let desired = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
    fs.chtimes(Path::new("note.txt"), desired, desired).unwrap();

    // Re-creating the file invalidates the stale virtual mtime: the real
    // mtime it was recorded against no longer describes the current file.
    fs.create(Path::new("note.txt")).unwrap();
    assert_ne!(fs.stat(Path::new("note.txt")).unwrap().mtime(), desired);
}

#[test]
fn full_layer_stack_composes_walk_case_and_mtime() {
    let backend = case_insensitive_backend();
    let database = Arc::new(MemoryDatabase::new());
    let fs = backend
        .layer(MtimeLayerBuilder::new(database))
        .layer(CaseLayerBuilder)
        .layer(WalkLayerBuilder);

    fs.mkdir_all(Path::new("Archive/2024"), FileMode::default_dir()).unwrap();
    fs.create(Path::new("Archive/2024/report.csv")).unwrap();

    let desired = SystemTime::UNIX_EPOCH + Duration::from_secs(2_000_000);
    fs.chtimes(Path::new("Archive/2024/report.csv"), desired, desired).unwrap();

    let mut seen = Vec::new();
    fs.walk(Path::new("."), &mut |path, info| {
        if let Ok(info) = info {
            seen.push((path.to_path_buf(), info.mtime()));
        }
        Ok(WalkAction::Continue)
    })
    .unwrap();

    let (_, mtime) = seen
        .iter()
        .find(|(p, _)| p == Path::new("Archive/2024/report.csv"))
        .unwrap();
    assert_eq!(*mtime, desired);

    // Case layer still enforces exact spelling through the whole stack.
    let err = fs.stat(Path::new("archive/2024/report.csv")).unwrap_err();
    assert!(matches!(err, FsError::CaseConflict { .. }));
}

#[test]
fn temp_name_stays_within_bound_for_very_long_real_names() {
    use syncvfs_core::temp_name;

    let long_name = "x".repeat(500);
    let staged = temp_name(&long_name);
    assert!(staged.chars().count() <= MAX_TEMP_NAME_LEN);
    assert!(staged.ends_with(".tmp"));
}

#[test]
fn fake_backend_watch_is_unsupported() {
    let fs = FakeBackend::new();
    let (_handle, cancel) = CancelToken::new();
    let err = fs
        .watch(Path::new("."), Arc::new(NoopIgnore), cancel, false)
        .unwrap_err();
    assert!(matches!(err, FsError::Unsupported { .. }));
}
