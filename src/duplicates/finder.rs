//! Scan pipeline orchestration.
//!
//! # Overview
//!
//! [`DuplicateFinder`] wires the pipeline together for one run:
//!
//! 1. **Discovery** walks each root sequentially on the calling thread and
//!    feeds candidates into a bounded work queue (backpressure: a full
//!    queue blocks the walk).
//! 2. **Worker pool** threads fingerprint candidates concurrently and
//!    append to the shared [`DuplicateIndex`].
//! 3. **Aggregator** runs on its own thread, counts outcomes, and owns the
//!    cancellation decision and the optional deadline.
//!
//! All threads live inside one [`std::thread::scope`], so the run cannot
//! return while any of them is still running. The index is frozen only after
//! every thread has been joined.
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::duplicates::{DuplicateFinder, FinderConfig};
//! use std::path::PathBuf;
//!
//! let config = FinderConfig::default().with_threads(4);
//! let finder = DuplicateFinder::new(config);
//!
//! let report = finder.find_duplicates(&[PathBuf::from(".")]).unwrap();
//! println!("Found {} duplicate groups", report.outcome.duplicate_groups);
//! ```

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{SendTimeoutError, Sender};

use super::aggregator::{
    Aggregator, CancellationState, Outcome, PoolError, RunCounters, RunOutcome,
};
use super::groups::IndexSnapshot;
use super::index::{DuplicateIndex, DEFAULT_SHARDS};
use super::pool::WorkerPool;
use crate::progress::ProgressCallback;
use crate::scanner::{
    normalize_roots, FileDescriptor, Fingerprinter, HashAlgorithm, Hasher, NamePattern, ScanError,
    WalkEvent, Walker, WalkerConfig, DEFAULT_BUFFER_SIZE,
};

/// Default work queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// How long the producer blocks on a full queue before rechecking cancellation.
const SEND_POLL: Duration = Duration::from_millis(50);

/// Default worker count: the machine's available parallelism.
#[must_use]
pub fn default_threads() -> usize {
    thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

/// Compile a filename pattern, rejecting it before any scanning starts.
///
/// # Errors
///
/// Returns [`FinderError::InvalidPattern`] if the regex does not compile.
pub fn compile_name_pattern(pattern: &str) -> Result<NamePattern, FinderError> {
    NamePattern::parse(pattern).map_err(|e| FinderError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Check that every root exists and is a directory.
///
/// # Errors
///
/// Returns [`FinderError::PathNotFound`] or [`FinderError::NotADirectory`]
/// for the first root that fails.
pub fn validate_roots(roots: &[PathBuf]) -> Result<(), FinderError> {
    for root in roots {
        if !root.exists() {
            return Err(FinderError::PathNotFound(root.clone()));
        }
        if !root.is_dir() {
            return Err(FinderError::NotADirectory(root.clone()));
        }
    }
    Ok(())
}

/// Configuration for the duplicate finder.
#[derive(Clone)]
pub struct FinderConfig {
    /// Number of hashing workers. 1 gives sequential processing.
    pub threads: usize,
    /// Work queue capacity; 0 means unbounded.
    pub queue_capacity: usize,
    /// Number of index shards; 1 means a single global lock.
    pub index_shards: usize,
    /// Walker configuration for directory traversal.
    pub walker_config: WalkerConfig,
    /// Fingerprint algorithm used when no custom fingerprinter is set.
    pub algorithm: HashAlgorithm,
    /// Read buffer size for hashing.
    pub buffer_size: usize,
    /// Overall run deadline.
    pub timeout: Option<Duration>,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
    /// Replaces the built-in hasher.
    pub fingerprinter: Option<Arc<dyn Fingerprinter>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("threads", &self.threads)
            .field("queue_capacity", &self.queue_capacity)
            .field("index_shards", &self.index_shards)
            .field("walker_config", &self.walker_config)
            .field("algorithm", &self.algorithm)
            .field("buffer_size", &self.buffer_size)
            .field("timeout", &self.timeout)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .field(
                "fingerprinter",
                &self.fingerprinter.as_ref().map(|_| "<fingerprinter>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            index_shards: DEFAULT_SHARDS,
            walker_config: WalkerConfig::default(),
            algorithm: HashAlgorithm::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            timeout: None,
            shutdown_flag: None,
            progress_callback: None,
            fingerprinter: None,
        }
    }
}

impl FinderConfig {
    /// Set the worker count (at least one).
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Set the work queue capacity (0 = unbounded).
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the number of index shards.
    #[must_use]
    pub fn with_index_shards(mut self, shards: usize) -> Self {
        self.index_shards = shards.max(1);
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the fingerprint algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the hashing buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Set the overall run deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Use a custom fingerprint function instead of the built-in hasher.
    #[must_use]
    pub fn with_fingerprinter(mut self, fingerprinter: Arc<dyn Fingerprinter>) -> Self {
        self.fingerprinter = Some(fingerprinter);
        self
    }
}

/// Errors that end a run without a report.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The provided path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The provided path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The filename pattern did not compile.
    #[error("Invalid name pattern '{pattern}': {message}")]
    InvalidPattern {
        /// Pattern as given
        pattern: String,
        /// Compiler message
        message: String,
    },

    /// The pool stopped on a fatal error after draining in-flight work.
    #[error(transparent)]
    Pool(PoolError),
}

impl From<PoolError> for FinderError {
    fn from(error: PoolError) -> Self {
        match error {
            PoolError::Interrupted => Self::Interrupted,
            other => Self::Pool(other),
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Frozen fingerprint index
    pub index: IndexSnapshot,
    /// Counters and derived totals
    pub outcome: RunOutcome,
}

/// Single-producer side of the work queue.
struct Producer<'a> {
    work: Sender<FileDescriptor>,
    counters: &'a RunCounters,
    cancellation: &'a CancellationState,
}

impl Producer<'_> {
    /// Queue a candidate, blocking while the queue is full.
    ///
    /// Returns `false` once the run is cancelled; the candidate is then
    /// counted as cancelled instead of queued.
    fn dispatch(&self, file: FileDescriptor) -> bool {
        self.counters.record_candidate();
        let mut item = file;

        loop {
            if self.cancellation.is_cancelled() {
                self.counters.record_undispatched();
                return false;
            }
            match self.work.send_timeout(item, SEND_POLL) {
                Ok(()) => {
                    self.counters.record_dispatched();
                    return true;
                }
                Err(SendTimeoutError::Timeout(back)) => item = back,
                Err(SendTimeoutError::Disconnected(_)) => {
                    self.cancellation.cancel(PoolError::QueueClosed);
                    self.counters.record_undispatched();
                    return false;
                }
            }
        }
    }

    /// Feed one walk event into the pipeline. Returns `false` to stop.
    fn handle_event(&self, event: Result<WalkEvent, ScanError>) -> bool {
        match event {
            Ok(WalkEvent::File(file)) => self.dispatch(file),
            Ok(WalkEvent::Filtered { .. }) => {
                self.counters.record_skipped();
                true
            }
            Err(ScanError::RootUnreadable { path, message }) => {
                self.cancellation
                    .cancel(PoolError::SourceUnreadable { path, message });
                false
            }
            Err(e) => {
                // Already logged by the walker
                log::debug!("Walk error counted: {}", e);
                self.counters.record_walk_error();
                true
            }
        }
    }

    fn stopped(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Duplicate finder that orchestrates the scan pipeline.
pub struct DuplicateFinder {
    config: FinderConfig,
    fingerprinter: Arc<dyn Fingerprinter>,
}

impl std::fmt::Debug for DuplicateFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateFinder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let fingerprinter = config.fingerprinter.clone().unwrap_or_else(|| {
            Arc::new(
                Hasher::new()
                    .with_algorithm(config.algorithm)
                    .with_buffer_size(config.buffer_size),
            )
        });
        Self {
            config,
            fingerprinter,
        }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Scan every root and return the frozen index with run counters.
    ///
    /// Roots are validated before anything starts, then canonicalized with
    /// nested roots dropped so no file is discovered twice.
    ///
    /// # Errors
    ///
    /// Returns `FinderError` if:
    /// - A root does not exist or is not a directory (nothing is scanned)
    /// - The run is interrupted by the shutdown flag
    /// - The pool stops on a fatal error (after in-flight work drains)
    pub fn find_duplicates(&self, roots: &[PathBuf]) -> Result<ScanReport, FinderError> {
        validate_roots(roots)?;

        let roots = normalize_roots(roots);
        log::info!(
            "Scanning {} root(s) with {} worker(s)",
            roots.len(),
            self.config.threads
        );

        self.run(|producer| {
            'roots: for root in &roots {
                let walker = Walker::new(root, self.config.walker_config.clone());
                for event in walker.walk() {
                    if producer.stopped() || !producer.handle_event(event) {
                        break 'roots;
                    }
                }
                log::debug!("Finished walking {}", root.display());
            }
        })
    }

    /// Run the pipeline over pre-discovered candidates.
    ///
    /// Filters are not applied; every descriptor is dispatched as given.
    ///
    /// # Errors
    ///
    /// Same as [`find_duplicates`](Self::find_duplicates), minus root validation.
    pub fn find_in_descriptors(
        &self,
        files: Vec<FileDescriptor>,
    ) -> Result<ScanReport, FinderError> {
        self.run(|producer| {
            for file in files {
                if !producer.dispatch(file) {
                    break;
                }
            }
        })
    }

    fn run<F>(&self, produce: F) -> Result<ScanReport, FinderError>
    where
        F: FnOnce(&Producer<'_>),
    {
        let start = Instant::now();
        let counters = Arc::new(RunCounters::default());
        let cancellation = Arc::new(CancellationState::new(self.config.shutdown_flag.clone()));
        let index = Arc::new(DuplicateIndex::new(self.config.index_shards));

        let (work_tx, work_rx) = if self.config.queue_capacity == 0 {
            crossbeam_channel::unbounded()
        } else {
            crossbeam_channel::bounded(self.config.queue_capacity)
        };
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded::<Outcome>();

        let progress = self.config.progress_callback.clone();
        if let Some(ref p) = progress {
            p.on_phase_start("scan", 0);
        }

        let aggregator = Aggregator::new(Arc::clone(&counters), Arc::clone(&cancellation))
            .with_timeout(self.config.timeout)
            .with_progress(progress.clone());
        let pool = WorkerPool::new(
            self.config.threads,
            Arc::clone(&self.fingerprinter),
            Arc::clone(&index),
            Arc::clone(&cancellation),
        );

        log::debug!(
            "Pipeline: {} workers, queue capacity {}, {} index shards",
            pool.size(),
            self.config.queue_capacity,
            index.shard_count()
        );

        thread::scope(|scope| {
            let aggregator_handle = thread::Builder::new()
                .name("dupsweep-aggregator".to_string())
                .spawn_scoped(scope, move || aggregator.await_completion(outcome_rx))
                .map_err(|e| PoolError::Spawn(e.to_string()))?;

            let workers = pool.spawn(scope, &work_rx, &outcome_tx);
            drop(work_rx);
            drop(outcome_tx);

            let producer = Producer {
                work: work_tx,
                counters: &counters,
                cancellation: &cancellation,
            };
            produce(&producer);
            // Closing the queue lets workers exit once it drains
            drop(producer);

            for worker in workers {
                if worker.join().is_err() {
                    log::error!("Worker thread terminated abnormally");
                }
            }

            aggregator_handle
                .join()
                .map(|_| ())
                .map_err(|_| PoolError::Spawn("aggregator thread panicked".to_string()))
        })?;

        if let Some(ref p) = progress {
            p.on_phase_end("scan");
        }

        let snapshot = Arc::try_unwrap(index)
            .map(DuplicateIndex::freeze)
            .unwrap_or_else(|shared| shared.snapshot());
        // Read after every thread has joined, so the counters are final.
        let outcome = RunOutcome::new(counters.snapshot(), &snapshot, start.elapsed());

        log::info!(
            "Scan finished in {:.2?}: {} visited, {} hashed, {} skipped, {} errored, {} duplicate groups",
            outcome.elapsed,
            outcome.visited,
            outcome.hashed,
            outcome.skipped,
            outcome.errored,
            outcome.duplicate_groups
        );
        debug_assert!(outcome.is_balanced(), "unbalanced counters: {outcome:?}");

        if let Some(reason) = cancellation.reason() {
            log::warn!(
                "Run stopped early ({}); {} items cancelled",
                reason,
                outcome.cancelled
            );
            return Err(reason.into());
        }

        Ok(ScanReport {
            index: snapshot,
            outcome,
        })
    }
}
