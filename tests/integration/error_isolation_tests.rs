use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use dupsweep::duplicates::{DuplicateFinder, FinderConfig, FinderError, PoolError};
use dupsweep::scanner::{FileDescriptor, Fingerprint, Fingerprinter, HashError, Hasher};

use super::common::{create_tree, group_names, names, scan};

/// Fails every file whose name starts with `bad`.
struct FailsOnBad;

impl Fingerprinter for FailsOnBad {
    fn fingerprint(&self, file: &FileDescriptor) -> Result<Fingerprint, HashError> {
        if file.name.starts_with("bad") {
            return Err(HashError::PermissionDenied(file.path.clone()));
        }
        Hasher::new().fingerprint(file)
    }
}

/// Panics on one file name.
struct PanicsOn(&'static str);

impl Fingerprinter for PanicsOn {
    fn fingerprint(&self, file: &FileDescriptor) -> Result<Fingerprint, HashError> {
        assert_ne!(file.name, self.0, "fingerprint blew up");
        Hasher::new().fingerprint(file)
    }
}

#[test]
fn test_failed_file_does_not_affect_others() {
    let dir = create_tree(&[
        ("a", b"payload"),
        ("b", b"payload"),
        ("bad1", b"payload"),
        ("bad2", b"other"),
        ("c", b"other"),
    ]);
    let config = FinderConfig::default()
        .with_threads(3)
        .with_fingerprinter(Arc::new(FailsOnBad));

    let report = scan(dir.path(), config);

    assert_eq!(report.outcome.errored, 2);
    assert_eq!(report.outcome.hashed, 3);
    assert_eq!(report.outcome.walk_errors, 0);
    assert_eq!(group_names(&report), BTreeSet::from([names(&["a", "b"])]));
    assert!(report.outcome.is_balanced());
}

#[test]
fn test_vanished_files_are_counted_not_fatal() {
    let dir = create_tree(&[("a", b"same"), ("b", b"same"), ("c", b"same")]);
    let files = ["a", "b", "c", "ghost"]
        .iter()
        .map(|n| FileDescriptor::new(dir.path().join(n), 4))
        .collect();

    let report = DuplicateFinder::with_defaults()
        .find_in_descriptors(files)
        .unwrap();

    assert_eq!(report.outcome.visited, 4);
    assert_eq!(report.outcome.errored, 1);
    assert_eq!(report.outcome.redundant_files, 2);
}

#[test]
fn test_size_change_after_discovery_is_recoverable() {
    let dir = create_tree(&[("grew", b"now much longer than before"), ("x", b"abc"), ("y", b"abc")]);
    let files = vec![
        FileDescriptor::new(dir.path().join("grew"), 3),
        FileDescriptor::new(dir.path().join("x"), 3),
        FileDescriptor::new(dir.path().join("y"), 3),
    ];

    let report = DuplicateFinder::with_defaults()
        .find_in_descriptors(files)
        .unwrap();

    assert_eq!(report.outcome.errored, 1);
    assert_eq!(report.outcome.hashed, 2);
    assert_eq!(report.outcome.duplicate_groups, 1);
    assert!(report
        .index
        .duplicate_groups()
        .iter()
        .all(|g| g.files.iter().all(|f| f.name != "grew")));
}

#[test]
fn test_worker_panic_is_pool_fatal() {
    let dir = create_tree(&[("a", b"1"), ("boom", b"2"), ("c", b"3")]);
    let config = FinderConfig::default()
        .with_threads(2)
        .with_fingerprinter(Arc::new(PanicsOn("boom")));

    let err = DuplicateFinder::new(config)
        .find_duplicates(&[dir.path().to_path_buf()])
        .unwrap_err();

    match err {
        FinderError::Pool(PoolError::WorkerPanicked { path, .. }) => {
            assert!(path.ends_with("boom"));
        }
        other => panic!("expected WorkerPanicked, got {other:?}"),
    }
}

#[test]
fn test_missing_root_is_rejected_up_front() {
    let dir = create_tree(&[("a", b"1")]);
    let roots = vec![dir.path().to_path_buf(), PathBuf::from("/nonexistent/dupsweep")];

    let err = DuplicateFinder::with_defaults().find_duplicates(&roots).unwrap_err();
    assert!(matches!(err, FinderError::PathNotFound(p) if p == PathBuf::from("/nonexistent/dupsweep")));
}

/// Permission bits are not enforced for privileged users (e.g. root in CI).
#[cfg(unix)]
fn skip_unenforced(test: &str) {
    eprintln!("SKIPPED {test}: permission bits are not enforced for this user");
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_recoverable() {
    use std::os::unix::fs::PermissionsExt;

    let dir = create_tree(&[("locked", b"secret"), ("open1", b"secret"), ("open2", b"secret")]);
    let locked = dir.path().join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::File::open(&locked).is_ok() {
        skip_unenforced("test_unreadable_file_is_recoverable");
        return;
    }

    let report = scan(dir.path(), FinderConfig::default());

    assert_eq!(report.outcome.errored, 1);
    assert_eq!(group_names(&report), BTreeSet::from([names(&["open1", "open2"])]));
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
}

#[cfg(unix)]
#[test]
fn test_unreadable_subdirectory_is_a_walk_error() {
    use std::os::unix::fs::PermissionsExt;

    let dir = create_tree(&[("sealed/inner", b"dup"), ("a", b"dup"), ("b", b"dup")]);
    let sealed = dir.path().join("sealed");
    fs::set_permissions(&sealed, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&sealed).is_ok() {
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();
        skip_unenforced("test_unreadable_subdirectory_is_a_walk_error");
        return;
    }

    let report = scan(dir.path(), FinderConfig::default());

    // the sealed directory is one entry, counted as an error and not as skipped
    assert_eq!(report.outcome.visited, 3);
    assert_eq!(report.outcome.walk_errors, 1);
    assert_eq!(report.outcome.errored, 1);
    assert_eq!(report.outcome.skipped, 0);
    assert_eq!(report.outcome.hashed, 2);
    assert_eq!(group_names(&report), BTreeSet::from([names(&["a", "b"])]));
    assert!(report.outcome.is_balanced());
    fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[test]
fn test_unreadable_root_is_pool_fatal() {
    use std::os::unix::fs::PermissionsExt;

    let dir = create_tree(&[("root/a", b"x")]);
    let root = dir.path().join("root");
    fs::set_permissions(&root, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&root).is_ok() {
        fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();
        skip_unenforced("test_unreadable_root_is_pool_fatal");
        return;
    }

    let result = DuplicateFinder::with_defaults().find_duplicates(&[root.clone()]);
    fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(
        result,
        Err(FinderError::Pool(PoolError::SourceUnreadable { .. }))
    ));
}
