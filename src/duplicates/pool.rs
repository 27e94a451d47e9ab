//! Fixed-size worker pool.
//!
//! # Overview
//!
//! [`WorkerPool`] starts `N` named threads inside a [`std::thread::Scope`].
//! Each worker pulls [`FileDescriptor`]s from the shared work queue,
//! streams the file through the [`Fingerprinter`], appends the result to the
//! [`DuplicateIndex`] and sends exactly one [`Outcome`] per dequeued item.
//!
//! Cancellation is checked between items, never mid-read. A worker that
//! dequeues an item after cancellation reports it as cancelled without
//! opening it and keeps draining until the queue closes. A panic inside the
//! fingerprint function is caught, reported as a fatal outcome for that
//! item, and the worker carries on draining.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, Scope, ScopedJoinHandle};

use crossbeam_channel::{Receiver, Sender};

use super::aggregator::{CancellationState, Outcome, PoolError};
use super::index::DuplicateIndex;
use crate::scanner::{FileDescriptor, Fingerprinter};

/// Per-worker counters, logged when the worker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Items successfully fingerprinted
    pub processed: u64,
    /// Bytes streamed
    pub bytes: u64,
    /// Items that failed or panicked
    pub errors: u64,
    /// Items dequeued after cancellation
    pub cancelled: u64,
}

/// One consumer of the work queue.
struct Worker {
    id: usize,
    fingerprinter: Arc<dyn Fingerprinter>,
    index: Arc<DuplicateIndex>,
    cancellation: Arc<CancellationState>,
    outcomes: Sender<Outcome>,
}

impl Worker {
    fn run(self, work: Receiver<FileDescriptor>) -> WorkerStats {
        let mut stats = WorkerStats::default();
        log::trace!("Worker {} started", self.id);

        for file in work.iter() {
            let outcome = self.process(file, &mut stats);
            if self.outcomes.send(outcome).is_err() {
                log::error!("Worker {}: outcome channel closed", self.id);
                break;
            }
        }

        log::debug!(
            "Worker {} finished: {} files, {} bytes, {} errors, {} cancelled",
            self.id,
            stats.processed,
            stats.bytes,
            stats.errors,
            stats.cancelled
        );
        stats
    }

    fn process(&self, file: FileDescriptor, stats: &mut WorkerStats) -> Outcome {
        if self.cancellation.is_cancelled() {
            stats.cancelled += 1;
            return Outcome::Cancelled(file.path);
        }

        log::trace!("Worker {} hashing {}", self.id, file.path.display());
        let fingerprinter = &self.fingerprinter;
        let result = panic::catch_unwind(AssertUnwindSafe(|| fingerprinter.fingerprint(&file)));

        match result {
            Ok(Ok(fingerprint)) => {
                let path = file.path.clone();
                let bytes = file.size;
                self.index.insert(fingerprint, file);
                stats.processed += 1;
                stats.bytes += bytes;
                Outcome::Hashed { path, bytes }
            }
            Ok(Err(error)) => {
                stats.errors += 1;
                Outcome::Failed(error)
            }
            Err(_) => {
                stats.errors += 1;
                Outcome::Fatal {
                    path: file.path.clone(),
                    error: PoolError::WorkerPanicked {
                        worker: self.id,
                        path: file.path,
                    },
                }
            }
        }
    }
}

/// A fixed number of hashing workers sharing one queue and one index.
pub struct WorkerPool {
    size: usize,
    fingerprinter: Arc<dyn Fingerprinter>,
    index: Arc<DuplicateIndex>,
    cancellation: Arc<CancellationState>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("fingerprinter", &"<fingerprinter>")
            .field("index_shards", &self.index.shard_count())
            .field("cancellation", &self.cancellation)
            .finish()
    }
}

impl WorkerPool {
    /// Create a pool of `size` workers (at least one).
    #[must_use]
    pub fn new(
        size: usize,
        fingerprinter: Arc<dyn Fingerprinter>,
        index: Arc<DuplicateIndex>,
        cancellation: Arc<CancellationState>,
    ) -> Self {
        Self {
            size: size.max(1),
            fingerprinter,
            index,
            cancellation,
        }
    }

    /// Configured number of workers.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Start every worker inside `scope`.
    ///
    /// Each worker gets a clone of `work` and `outcomes`; the caller should
    /// drop its own handles afterwards so the channels close when the
    /// producer and the workers are done.
    ///
    /// If a thread fails to start, the run is cancelled with
    /// [`PoolError::Spawn`] and the workers already running drain the queue.
    pub fn spawn<'scope, 'env>(
        &self,
        scope: &'scope Scope<'scope, 'env>,
        work: &Receiver<FileDescriptor>,
        outcomes: &Sender<Outcome>,
    ) -> Vec<ScopedJoinHandle<'scope, WorkerStats>> {
        let mut handles = Vec::with_capacity(self.size);

        for id in 0..self.size {
            let worker = Worker {
                id,
                fingerprinter: Arc::clone(&self.fingerprinter),
                index: Arc::clone(&self.index),
                cancellation: Arc::clone(&self.cancellation),
                outcomes: outcomes.clone(),
            };
            let work = work.clone();

            let spawned = thread::Builder::new()
                .name(format!("dupsweep-worker-{id}"))
                .spawn_scoped(scope, move || worker.run(work));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    log::error!("Failed to spawn worker {}: {}", id, e);
                    self.cancellation.cancel(PoolError::Spawn(e.to_string()));
                    break;
                }
            }
        }

        log::debug!("Started {} of {} workers", handles.len(), self.size);
        handles
    }
}
