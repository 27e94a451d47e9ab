//! Concurrent duplicate index.
//!
//! # Overview
//!
//! [`DuplicateIndex`] maps a content fingerprint to the files that produced
//! it. It is the only structure mutated by more than one worker. The map is
//! split into shards selected by the fingerprint's first byte; each shard
//! sits behind its own mutex, so appends for different fingerprints rarely
//! contend while appends for the same fingerprint are always serialized.
//! With one shard it degrades to a single global lock.
//!
//! The index only grows during a run. Once every worker has finished it is
//! [frozen](DuplicateIndex::freeze) into a read-only [`IndexSnapshot`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::groups::IndexSnapshot;
use crate::scanner::{FileDescriptor, Fingerprint};

/// Default number of shards.
pub const DEFAULT_SHARDS: usize = 16;

type Shard = HashMap<Fingerprint, Vec<FileDescriptor>>;

/// Fingerprint → files map shared by all workers.
#[derive(Debug)]
pub struct DuplicateIndex {
    shards: Vec<Mutex<Shard>>,
}

impl Default for DuplicateIndex {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}

impl DuplicateIndex {
    /// Create an empty index with `shards` locks (at least one).
    #[must_use]
    pub fn new(shards: usize) -> Self {
        let shards = shards.clamp(1, 256);
        Self {
            shards: (0..shards).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    /// Number of shards in use.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, fingerprint: &Fingerprint) -> MutexGuard<'_, Shard> {
        let slot = usize::from(fingerprint[0]) % self.shards.len();
        // Entries are only ever appended, so a poisoned shard is still consistent.
        self.shards[slot]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `file` to the list for `fingerprint`.
    ///
    /// Returns `false` if the same path was already recorded under this
    /// fingerprint, in which case the index is left unchanged.
    pub fn insert(&self, fingerprint: Fingerprint, file: FileDescriptor) -> bool {
        let mut shard = self.shard(&fingerprint);
        let files = shard.entry(fingerprint).or_default();
        if files.iter().any(|existing| existing.path == file.path) {
            log::debug!("Path already indexed: {}", file.path.display());
            return false;
        }
        files.push(file);
        true
    }

    /// Total number of files recorded.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.shards
            .iter()
            .map(|s| {
                s.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .values()
                    .map(Vec::len)
                    .sum::<usize>()
            })
            .sum()
    }

    /// Copy the current contents into a snapshot without consuming the index.
    #[must_use]
    pub fn snapshot(&self) -> IndexSnapshot {
        let mut entries = HashMap::new();
        for shard in &self.shards {
            let shard = shard.lock().unwrap_or_else(PoisonError::into_inner);
            entries.extend(shard.iter().map(|(k, v)| (*k, v.clone())));
        }
        IndexSnapshot::from_entries(entries)
    }

    /// Consume the index once all writers are gone.
    #[must_use]
    pub fn freeze(self) -> IndexSnapshot {
        let mut entries = HashMap::new();
        for shard in self.shards {
            entries.extend(shard.into_inner().unwrap_or_else(PoisonError::into_inner));
        }
        IndexSnapshot::from_entries(entries)
    }
}
