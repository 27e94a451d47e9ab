use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use dupsweep::actions::{delete_duplicates, DeleteConfig, DeleteProgressCallback};
use dupsweep::duplicates::{FinderConfig, KeepPolicy};

use super::common::{create_tree, scan};

#[derive(Default)]
struct Counting {
    ok: AtomicUsize,
    failed: AtomicUsize,
}

impl DeleteProgressCallback for Counting {
    fn on_delete_success(&self, _path: &Path, _size: u64) {
        self.ok.fetch_add(1, Ordering::SeqCst);
    }

    fn on_delete_failure(&self, _path: &Path, _error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_scan_then_delete_keeps_smallest_path() {
    let dir = create_tree(&[
        ("b/copy.txt", b"shared"),
        ("a/original.txt", b"shared"),
        ("c/third.txt", b"shared"),
        ("unique.txt", b"alone"),
    ]);
    let report = scan(dir.path(), FinderConfig::default().with_threads(4));
    let groups = report.index.duplicate_groups();

    let result = delete_duplicates(&groups, &DeleteConfig::permanent(), None);

    assert!(result.all_succeeded());
    assert_eq!(result.success_count(), 2);
    assert_eq!(result.bytes_freed, 12);
    assert!(dir.path().join("a/original.txt").exists());
    assert!(!dir.path().join("b/copy.txt").exists());
    assert!(!dir.path().join("c/third.txt").exists());
    assert!(dir.path().join("unique.txt").exists());

    let rescan = scan(dir.path(), FinderConfig::default());
    assert_eq!(rescan.outcome.duplicate_groups, 0);
}

#[test]
fn test_first_seen_policy_leaves_one_copy() {
    let dir = create_tree(&[("x1", b"dup"), ("x2", b"dup"), ("x3", b"dup"), ("x4", b"dup")]);
    let report = scan(dir.path(), FinderConfig::default().with_threads(3));
    let groups = report.index.duplicate_groups();
    let keeper = groups[0].keeper(KeepPolicy::FirstSeen).path.clone();

    let config = DeleteConfig::permanent().with_keep(KeepPolicy::FirstSeen);
    let result = delete_duplicates(&groups, &config, None);

    assert_eq!(result.success_count(), 3);
    let remaining: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(remaining.len(), 1);
    assert!(keeper.exists());
}

#[test]
fn test_modified_copy_is_not_deleted() {
    let dir = create_tree(&[("a", b"same!"), ("b", b"same!"), ("c", b"same!")]);
    let report = scan(dir.path(), FinderConfig::default());
    let groups = report.index.duplicate_groups();
    fs::write(dir.path().join("c"), b"edited after the scan").unwrap();

    let callback = Counting::default();
    let result = delete_duplicates(&groups, &DeleteConfig::permanent(), Some(&callback));

    assert_eq!(result.success_count(), 1);
    assert_eq!(result.failure_count(), 1);
    assert_eq!(callback.ok.load(Ordering::SeqCst), 1);
    assert_eq!(callback.failed.load(Ordering::SeqCst), 1);
    assert!(dir.path().join("a").exists());
    assert!(dir.path().join("c").exists());
    assert!(!dir.path().join("b").exists());
}

#[test]
fn test_missing_keeper_skips_group() {
    let dir = create_tree(&[("a", b"same"), ("b", b"same")]);
    let report = scan(dir.path(), FinderConfig::default());
    let groups = report.index.duplicate_groups();
    fs::remove_file(dir.path().join("a")).unwrap();

    let result = delete_duplicates(&groups, &DeleteConfig::permanent(), None);

    assert_eq!(result.success_count(), 0);
    assert_eq!(result.failure_count(), 1);
    assert!(dir.path().join("b").exists());
}
