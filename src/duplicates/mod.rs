//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - The concurrent scan-and-hash pipeline ([`finder`])
//! - The fixed-size hashing worker pool ([`pool`])
//! - The shared fingerprint index ([`index`]) and its frozen view ([`groups`])
//! - Outcome aggregation and cancellation ([`aggregator`])

pub mod aggregator;
pub mod finder;
pub mod groups;
pub mod index;
pub mod pool;

pub use aggregator::{
    Aggregator, CancellationState, CountersSnapshot, Outcome, PoolError, RunCounters, RunOutcome,
};
pub use finder::{
    compile_name_pattern, default_threads, DuplicateFinder, FinderConfig, FinderError, ScanReport,
    validate_roots, DEFAULT_QUEUE_CAPACITY,
};
pub use groups::{DuplicateGroup, IndexSnapshot, KeepPolicy};
pub use index::{DuplicateIndex, DEFAULT_SHARDS};
pub use pool::{WorkerPool, WorkerStats};
