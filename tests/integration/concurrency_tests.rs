use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dupsweep::duplicates::{DuplicateFinder, FinderConfig, FinderError, PoolError};
use dupsweep::scanner::{FileDescriptor, Fingerprint, Fingerprinter, HashError, Hasher};
use tempfile::TempDir;

use super::common::{create_tree, root_of, scan};

/// 120 files in 6 directories with 10 distinct contents.
fn wide_tree() -> TempDir {
    let files: Vec<(String, Vec<u8>)> = (0..120)
        .map(|i| (format!("dir{}/file{i}.bin", i % 6), format!("content-{}", i % 10).into_bytes()))
        .collect();
    let refs: Vec<(&str, &[u8])> = files.iter().map(|(n, c)| (n.as_str(), c.as_slice())).collect();
    create_tree(&refs)
}

/// Sleeps before hashing; counts how many calls overlap.
struct Slow {
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Slow {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

impl Fingerprinter for Slow {
    fn fingerprint(&self, file: &FileDescriptor) -> Result<Fingerprint, HashError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.active.fetch_sub(1, Ordering::SeqCst);
        Hasher::new().fingerprint(file)
    }
}

/// Raises the shutdown flag after the first file.
struct InterruptAfterFirst(Arc<AtomicBool>);

impl Fingerprinter for InterruptAfterFirst {
    fn fingerprint(&self, file: &FileDescriptor) -> Result<Fingerprint, HashError> {
        self.0.store(true, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(5));
        Hasher::new().fingerprint(file)
    }
}

#[test]
fn test_thread_counts_produce_identical_groups() {
    let dir = wide_tree();
    let baseline = scan(dir.path(), FinderConfig::default().with_threads(1));

    for threads in [2, 4, 16] {
        let report = scan(dir.path(), FinderConfig::default().with_threads(threads));
        assert_eq!(report.index.path_sets(), baseline.index.path_sets(), "threads={threads}");
        assert_eq!(report.outcome.hashed, 120);
        assert_eq!(report.outcome.duplicate_groups, 10);
        assert_eq!(report.outcome.redundant_files, 110);
        assert!(report.outcome.is_balanced());
    }
}

#[test]
fn test_queue_capacities_produce_identical_groups() {
    let dir = wide_tree();
    let baseline = scan(dir.path(), FinderConfig::default());

    for capacity in [0, 1, 3, 10_000] {
        let config = FinderConfig::default()
            .with_threads(4)
            .with_queue_capacity(capacity);
        let report = scan(dir.path(), config);
        assert_eq!(report.index.path_sets(), baseline.index.path_sets(), "capacity={capacity}");
    }
}

#[test]
fn test_single_global_lock_matches_sharded_index() {
    let dir = wide_tree();
    let global = scan(
        dir.path(),
        FinderConfig::default().with_threads(8).with_index_shards(1),
    );
    let sharded = scan(
        dir.path(),
        FinderConfig::default().with_threads(8).with_index_shards(64),
    );

    assert_eq!(global.index.path_sets(), sharded.index.path_sets());
}

#[test]
fn test_pool_size_bounds_concurrency() {
    let dir = create_tree(&[
        ("a", b"1"),
        ("b", b"2"),
        ("c", b"3"),
        ("d", b"4"),
        ("e", b"5"),
        ("f", b"6"),
        ("g", b"7"),
        ("h", b"8"),
    ]);
    let slow = Arc::new(Slow::new(Duration::from_millis(20)));
    let config = FinderConfig::default()
        .with_threads(3)
        .with_queue_capacity(1)
        .with_fingerprinter(slow.clone());

    let report = scan(dir.path(), config);

    assert_eq!(report.outcome.hashed, 8);
    assert!(slow.peak.load(Ordering::SeqCst) <= 3);
}

#[test]
fn test_deadline_cancels_and_drains() {
    let files: Vec<(String, Vec<u8>)> = (0..20).map(|i| (format!("f{i}"), vec![i as u8; 8])).collect();
    let refs: Vec<(&str, &[u8])> = files.iter().map(|(n, c)| (n.as_str(), c.as_slice())).collect();
    let dir = create_tree(&refs);
    let config = FinderConfig::default()
        .with_threads(1)
        .with_queue_capacity(2)
        .with_timeout(Some(Duration::from_millis(100)))
        .with_fingerprinter(Arc::new(Slow::new(Duration::from_millis(60))));

    let err = DuplicateFinder::new(config)
        .find_duplicates(&root_of(&dir))
        .unwrap_err();

    assert!(matches!(
        err,
        FinderError::Pool(PoolError::DeadlineExceeded(d)) if d == Duration::from_millis(100)
    ));
}

#[test]
fn test_shutdown_mid_run_is_interrupted() {
    let files: Vec<(String, Vec<u8>)> = (0..50).map(|i| (format!("f{i}"), vec![1u8; 4])).collect();
    let refs: Vec<(&str, &[u8])> = files.iter().map(|(n, c)| (n.as_str(), c.as_slice())).collect();
    let dir = create_tree(&refs);
    let flag = Arc::new(AtomicBool::new(false));
    let config = FinderConfig::default()
        .with_threads(2)
        .with_queue_capacity(1)
        .with_shutdown_flag(flag.clone())
        .with_fingerprinter(Arc::new(InterruptAfterFirst(flag.clone())));

    let err = DuplicateFinder::new(config)
        .find_duplicates(&root_of(&dir))
        .unwrap_err();

    assert!(matches!(err, FinderError::Interrupted));
}

#[test]
fn test_finder_is_reusable_across_runs() {
    let dir = wide_tree();
    let finder = DuplicateFinder::new(FinderConfig::default().with_threads(4));

    let first = finder.find_duplicates(&root_of(&dir)).unwrap();
    let second = finder.find_duplicates(&root_of(&dir)).unwrap();

    assert_eq!(first.index.path_sets(), second.index.path_sets());
    assert_eq!(first.outcome.visited, second.outcome.visited);
}
