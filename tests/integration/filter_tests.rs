use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use dupsweep::duplicates::FinderConfig;
use dupsweep::scanner::{
    FileDescriptor, Fingerprint, Fingerprinter, HashError, Hasher, NamePattern, WalkerConfig,
};

use super::common::{create_tree, group_names, names, scan};

/// Records the names of opened files.
#[derive(Default)]
struct Recorder(Mutex<BTreeSet<String>>);

impl Fingerprinter for Recorder {
    fn fingerprint(&self, file: &FileDescriptor) -> Result<Fingerprint, HashError> {
        self.0.lock().unwrap().insert(file.name.clone());
        Hasher::new().fingerprint(file)
    }
}

fn with_walker(walker: WalkerConfig) -> FinderConfig {
    FinderConfig::default().with_walker_config(walker)
}

#[test]
fn test_min_size_is_inclusive() {
    let dir = create_tree(&[("four1", b"1234"), ("four2", b"1234"), ("three", b"123")]);

    let report = scan(dir.path(), with_walker(WalkerConfig::default().with_min_size(4)));

    assert_eq!(report.outcome.skipped, 1);
    assert_eq!(group_names(&report), BTreeSet::from([names(&["four1", "four2"])]));
}

#[test]
fn test_min_size_above_every_file() {
    let dir = create_tree(&[("a.txt", b"hello"), ("b.txt", b"hello"), ("c.txt", b"world")]);

    let report = scan(dir.path(), with_walker(WalkerConfig::default().with_min_size(10)));

    assert_eq!(report.outcome.skipped, 3);
    assert_eq!(report.outcome.hashed, 0);
    assert!(report.index.duplicate_groups().is_empty());
}

#[test]
fn test_max_size_excludes_large_files() {
    let dir = create_tree(&[
        ("small1", b"tiny"),
        ("small2", b"tiny"),
        ("large1", b"this one is too large"),
        ("large2", b"this one is too large"),
    ]);

    let report = scan(dir.path(), with_walker(WalkerConfig::default().with_max_size(Some(10))));

    assert_eq!(group_names(&report), BTreeSet::from([names(&["small1", "small2"])]));
    assert_eq!(report.outcome.skipped, 2);
}

#[test]
fn test_name_pattern_never_opens_mismatches() {
    let dir = create_tree(&[
        ("x.jpg", b"pixels"),
        ("y.jpeg", b"pixels"),
        ("z.png", b"pixels"),
        ("readme", b"pixels"),
    ]);
    let recorder = Arc::new(Recorder::default());
    let config = with_walker(
        WalkerConfig::default().with_name_pattern(NamePattern::parse(r"\.jpe?g$").unwrap()),
    )
    .with_fingerprinter(recorder.clone());

    let report = scan(dir.path(), config);

    assert_eq!(*recorder.0.lock().unwrap(), names(&["x.jpg", "y.jpeg"]));
    assert_eq!(report.outcome.skipped, 2);
    assert_eq!(group_names(&report), BTreeSet::from([names(&["x.jpg", "y.jpeg"])]));
}

#[test]
fn test_star_pattern_matches_all() {
    let dir = create_tree(&[("a", b"s"), (".b", b"s"), ("c.d.e", b"s")]);

    let config = with_walker(WalkerConfig::default().with_name_pattern(NamePattern::parse("*").unwrap()));
    let report = scan(dir.path(), config);

    assert_eq!(report.outcome.hashed, 3);
}

#[test]
fn test_ignore_patterns_prune_directories() {
    let dir = create_tree(&[
        ("src/main.rs", b"fn main() {}"),
        ("target/debug/main.rs", b"fn main() {}"),
        ("notes.tmp", b"fn main() {}"),
    ]);
    let recorder = Arc::new(Recorder::default());
    let config = with_walker(
        WalkerConfig::default().with_ignore_patterns(vec!["target".into(), "*.tmp".into()]),
    )
    .with_fingerprinter(recorder.clone());

    let report = scan(dir.path(), config);

    assert_eq!(*recorder.0.lock().unwrap(), names(&["main.rs"]));
    assert_eq!(report.outcome.hashed, 1);
    assert_eq!(report.outcome.duplicate_groups, 0);
}

#[test]
fn test_skip_hidden() {
    let dir = create_tree(&[("visible", b"same"), (".hidden", b"same"), (".git/obj", b"same")]);
    let mut walker = WalkerConfig::default();
    walker.skip_hidden = true;

    let report = scan(dir.path(), with_walker(walker));

    assert_eq!(report.outcome.hashed, 1);
    assert_eq!(report.outcome.duplicate_groups, 0);
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_not_followed_by_default() {
    let dir = create_tree(&[("real", b"linked content")]);
    std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();

    let report = scan(dir.path(), FinderConfig::default());

    assert_eq!(report.outcome.hashed, 1);
    assert_eq!(report.outcome.skipped, 1);
    assert_eq!(report.outcome.duplicate_groups, 0);
}
