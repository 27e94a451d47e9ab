//! Result aggregation and cancellation control.
//!
//! # Overview
//!
//! Every descriptor handed to the worker pool produces exactly one
//! [`Outcome`]. The [`Aggregator`] receives them on its own thread, folds
//! them into the shared [`RunCounters`], and decides whether an outcome is
//! fatal to the run. Per-file failures are logged and counted; only
//! dispatch-level failures ([`PoolError`]) flip the [`CancellationState`].
//!
//! Cancellation is cooperative. Once set, the producer stops dispatching and
//! workers report any item they still dequeue as [`Outcome::Cancelled`]
//! without opening it, so the queue drains and every item is still
//! accounted for. The first reason recorded wins; later ones are dropped.
//!
//! [`Aggregator::await_completion`] returns when the last worker has
//! dropped its outcome sender. It also enforces the optional run deadline
//! and observes the external shutdown flag set by Ctrl+C.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::Serialize;

use super::groups::IndexSnapshot;
use crate::progress::ProgressCallback;
use crate::scanner::HashError;

/// How often the aggregator wakes to check the deadline and shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors in the dispatch mechanism itself.
///
/// Any of these stops new work from being dispatched. In-flight items still
/// drain before the error is surfaced.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The work source could not be read.
    #[error("Cannot read scan root {path}: {message}")]
    SourceUnreadable {
        /// Root that failed
        path: PathBuf,
        /// Underlying error text
        message: String,
    },

    /// Every worker went away while work was still being dispatched.
    #[error("Work queue closed unexpectedly")]
    QueueClosed,

    /// A worker panicked while processing a file.
    #[error("Worker {worker} panicked while processing {path}")]
    WorkerPanicked {
        /// Worker id
        worker: usize,
        /// File being processed
        path: PathBuf,
    },

    /// A worker thread could not be started.
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),

    /// The overall run deadline passed.
    #[error("Scan did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    /// Shutdown was requested by the user.
    #[error("Scan interrupted by user")]
    Interrupted,
}

/// Result of processing one dispatched file.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Fingerprinted and appended to the index.
    Hashed {
        /// Path of the file
        path: PathBuf,
        /// Bytes streamed
        bytes: u64,
    },
    /// Recoverable per-file failure; the file is not indexed.
    Failed(HashError),
    /// Dequeued after cancellation and never opened.
    Cancelled(PathBuf),
    /// The item broke the pool itself.
    Fatal {
        /// Path of the file
        path: PathBuf,
        /// What went wrong
        error: PoolError,
    },
}

impl Outcome {
    /// The path this outcome refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Hashed { path, .. } | Self::Cancelled(path) | Self::Fatal { path, .. } => path,
            Self::Failed(e) => e.path(),
        }
    }
}

/// Shared run-wide cancellation signal.
///
/// Transitions at most once from running to cancelled. The reason recorded
/// by the first [`cancel`](Self::cancel) is kept.
#[derive(Debug, Default)]
pub struct CancellationState {
    cancelled: AtomicBool,
    reason: OnceLock<PoolError>,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl CancellationState {
    /// Create a running state, optionally tied to an external shutdown flag.
    #[must_use]
    pub fn new(shutdown_flag: Option<Arc<AtomicBool>>) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            reason: OnceLock::new(),
            shutdown_flag,
        }
    }

    /// Cancel the run. Returns `true` if this call set the reason.
    pub fn cancel(&self, reason: PoolError) -> bool {
        let first = self.reason.set(reason).is_ok();
        self.cancelled.store(true, Ordering::SeqCst);
        first
    }

    /// Whether the run has been cancelled.
    ///
    /// A raised shutdown flag is converted into an `Interrupted` cancellation
    /// on first observation.
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        if self
            .shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
        {
            if self.cancel(PoolError::Interrupted) {
                log::info!("Shutdown requested, stopping dispatch");
            }
            return true;
        }
        false
    }

    /// The recorded reason, if cancelled.
    #[must_use]
    pub fn reason(&self) -> Option<PoolError> {
        self.reason.get().cloned()
    }
}

/// Run-wide counters, updated with plain atomic increments.
///
/// The producer owns `visited`, `skipped`, `walk_errors` and `dispatched`;
/// the aggregator owns the per-outcome counters.
#[derive(Debug, Default)]
pub struct RunCounters {
    visited: AtomicU64,
    skipped: AtomicU64,
    walk_errors: AtomicU64,
    dispatched: AtomicU64,
    hashed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    undispatched: AtomicU64,
    bytes_hashed: AtomicU64,
}

impl RunCounters {
    /// A discovered entry was filtered out before dispatch.
    pub fn record_skipped(&self) {
        self.visited.fetch_add(1, Ordering::Relaxed);
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// A discovered entry could not be inspected.
    pub fn record_walk_error(&self) {
        self.visited.fetch_add(1, Ordering::Relaxed);
        self.walk_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// A candidate was discovered and is about to be dispatched.
    pub fn record_candidate(&self) {
        self.visited.fetch_add(1, Ordering::Relaxed);
    }

    /// A candidate entered the work queue.
    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// A candidate was never queued because the run was cancelled.
    pub fn record_undispatched(&self) {
        self.undispatched.fetch_add(1, Ordering::Relaxed);
    }

    fn record_outcome(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Hashed { bytes, .. } => {
                self.hashed.fetch_add(1, Ordering::Relaxed);
                self.bytes_hashed.fetch_add(*bytes, Ordering::Relaxed);
            }
            Outcome::Failed(_) | Outcome::Fatal { .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Cancelled(_) => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Read every counter.
    ///
    /// Values are read individually, so a snapshot taken mid-run may be
    /// slightly inconsistent. After all threads finish it is exact.
    #[must_use]
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            visited: self.visited.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            walk_errors: self.walk_errors.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            hashed: self.hashed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            undispatched: self.undispatched.load(Ordering::Relaxed),
            bytes_hashed: self.bytes_hashed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RunCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    /// Entries seen by discovery
    pub visited: u64,
    /// Entries filtered out before dispatch
    pub skipped: u64,
    /// Entries discovery could not inspect
    pub walk_errors: u64,
    /// Items placed on the work queue
    pub dispatched: u64,
    /// Items fingerprinted and indexed
    pub hashed: u64,
    /// Items whose processing failed
    pub failed: u64,
    /// Queued items reported as cancelled by workers
    pub cancelled: u64,
    /// Candidates never queued because the run was cancelled
    pub undispatched: u64,
    /// Bytes streamed through the fingerprint function
    pub bytes_hashed: u64,
}

impl CountersSnapshot {
    /// Walk errors plus per-file failures.
    #[must_use]
    pub fn errored(&self) -> u64 {
        self.walk_errors + self.failed
    }

    /// Outcomes received from workers.
    #[must_use]
    pub fn reported(&self) -> u64 {
        self.hashed + self.failed + self.cancelled
    }

    /// Items dispatched but not yet reported.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.dispatched.saturating_sub(self.reported())
    }
}

/// Final counters of a run plus values derived from the frozen index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    /// Entries seen by discovery
    pub visited: u64,
    /// Files fingerprinted and indexed
    pub hashed: u64,
    /// Entries filtered out before dispatch (directories included)
    pub skipped: u64,
    /// Entries that failed during the walk or while hashing
    pub errored: u64,
    /// Entries dropped because the run was cancelled
    pub cancelled: u64,
    /// Subset of `errored` raised during the walk
    pub walk_errors: u64,
    /// Bytes streamed through the fingerprint function
    pub bytes_hashed: u64,
    /// Fingerprints shared by more than one file
    pub duplicate_groups: u64,
    /// `sum(len(group) - 1)` over duplicate groups
    pub redundant_files: u64,
    /// Bytes freed by removing every redundant copy
    pub reclaimable_bytes: u64,
    /// Wall-clock time of the run
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunOutcome {
    /// Combine final counters with the frozen index.
    #[must_use]
    pub fn new(counters: CountersSnapshot, index: &IndexSnapshot, elapsed: Duration) -> Self {
        let cancelled = counters.cancelled + counters.undispatched + counters.in_flight();
        Self {
            visited: counters.visited,
            hashed: counters.hashed,
            skipped: counters.skipped,
            errored: counters.errored(),
            cancelled,
            walk_errors: counters.walk_errors,
            bytes_hashed: counters.bytes_hashed,
            duplicate_groups: index.duplicate_group_count() as u64,
            redundant_files: index.redundant_file_count() as u64,
            reclaimable_bytes: index.reclaimable_bytes(),
            elapsed,
        }
    }

    /// Files that passed the filters and were handed to the pool.
    #[must_use]
    pub fn candidates(&self) -> u64 {
        self.hashed + self.errored.saturating_sub(self.walk_errors) + self.cancelled
    }

    /// `visited == hashed + skipped + errored + cancelled`.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.visited == self.hashed + self.skipped + self.errored + self.cancelled
    }
}

/// Collects worker outcomes and owns the fatal/recoverable decision.
pub struct Aggregator {
    counters: Arc<RunCounters>,
    cancellation: Arc<CancellationState>,
    progress: Option<Arc<dyn ProgressCallback>>,
    deadline: Option<(Instant, Duration)>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("counters", &self.counters)
            .field("cancellation", &self.cancellation)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Aggregator {
    /// Create an aggregator over shared counters and cancellation state.
    #[must_use]
    pub fn new(counters: Arc<RunCounters>, cancellation: Arc<CancellationState>) -> Self {
        Self {
            counters,
            cancellation,
            progress: None,
            deadline: None,
        }
    }

    /// Cancel the run if it is still going after `timeout`, measured from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.deadline = timeout.map(|t| (Instant::now() + t, t));
        self
    }

    /// Publish counters to a progress observer after each outcome.
    #[must_use]
    pub fn with_progress(mut self, progress: Option<Arc<dyn ProgressCallback>>) -> Self {
        self.progress = progress;
        self
    }

    /// Fold one outcome into the counters.
    ///
    /// Returns `true` if the outcome cancelled the run.
    pub fn record(&self, outcome: &Outcome) -> bool {
        self.counters.record_outcome(outcome);

        let cancelled = match outcome {
            Outcome::Hashed { path, bytes } => {
                log::trace!("Hashed {} ({} bytes)", path.display(), bytes);
                false
            }
            Outcome::Failed(error) => {
                log::warn!("Skipping file: {}", error);
                false
            }
            Outcome::Cancelled(path) => {
                log::trace!("Cancelled before processing: {}", path.display());
                false
            }
            Outcome::Fatal { error, .. } => {
                log::error!("{}", error);
                self.cancellation.cancel(error.clone())
            }
        };

        if let Some(progress) = &self.progress {
            progress.on_progress(&self.counters.snapshot(), outcome.path());
        }

        cancelled
    }

    fn poll(&self) {
        if let Some((deadline, timeout)) = self.deadline {
            if Instant::now() >= deadline
                && self
                    .cancellation
                    .cancel(PoolError::DeadlineExceeded(timeout))
            {
                log::warn!("Deadline of {:?} reached, draining in-flight work", timeout);
            }
        }
        // Observes the shutdown flag even while no outcomes arrive.
        self.cancellation.is_cancelled();
    }

    /// Block until every outcome sender is dropped.
    ///
    /// Returns the counters at completion. Any dispatched item that never
    /// reported is logged; [`RunOutcome::new`] counts it as cancelled.
    pub fn await_completion(self, outcomes: Receiver<Outcome>) -> CountersSnapshot {
        let mut received: u64 = 0;

        loop {
            match outcomes.recv_timeout(POLL_INTERVAL) {
                Ok(outcome) => {
                    received += 1;
                    self.record(&outcome);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.poll();
        }

        let snapshot = self.counters.snapshot();
        if snapshot.in_flight() > 0 {
            log::warn!(
                "{} dispatched items never reported; counting them as cancelled",
                snapshot.in_flight()
            );
        }
        log::debug!(
            "Aggregator finished: {} outcomes, {} hashed, {} failed, {} cancelled",
            received,
            snapshot.hashed,
            snapshot.failed,
            snapshot.cancelled
        );
        snapshot
    }
}
