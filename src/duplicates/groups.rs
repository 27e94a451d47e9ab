//! Frozen index and duplicate group management.
//!
//! # Overview
//!
//! Once every worker has drained, the [`DuplicateIndex`](super::DuplicateIndex)
//! is frozen into an [`IndexSnapshot`], a read-only view handed to the
//! reporter and deleter. A duplicate group is any fingerprint whose file list
//! has more than one entry. Group counts, redundant-file counts and
//! reclaimable bytes are all derived from the snapshot, never stored.
//!
//! # Example
//!
//! ```
//! use dupsweep::duplicates::{IndexSnapshot, KeepPolicy};
//! use dupsweep::scanner::FileDescriptor;
//! use std::collections::HashMap;
//! use std::path::PathBuf;
//!
//! let mut entries = HashMap::new();
//! entries.insert([1u8; 32], vec![
//!     FileDescriptor::new(PathBuf::from("/b.txt"), 5),
//!     FileDescriptor::new(PathBuf::from("/a.txt"), 5),
//! ]);
//! entries.insert([2u8; 32], vec![FileDescriptor::new(PathBuf::from("/c.txt"), 5)]);
//!
//! let snapshot = IndexSnapshot::from_entries(entries);
//! assert_eq!(snapshot.duplicate_group_count(), 1);
//! assert_eq!(snapshot.redundant_file_count(), 1);
//!
//! let groups = snapshot.duplicate_groups();
//! assert_eq!(groups[0].keeper(KeepPolicy::Lexicographic).path, PathBuf::from("/a.txt"));
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::scanner::{hash_to_hex, FileDescriptor, Fingerprint};

/// Which copy of a duplicate group survives deletion.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum KeepPolicy {
    /// Keep the lexicographically smallest path (deterministic across runs)
    #[default]
    Lexicographic,
    /// Keep whichever path finished hashing first (varies between runs)
    FirstSeen,
}

impl std::fmt::Display for KeepPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexicographic => write!(f, "lexicographic"),
            Self::FirstSeen => write!(f, "first-seen"),
        }
    }
}

/// Confirmed duplicate group of files.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    /// Content fingerprint shared by every file
    pub fingerprint: Fingerprint,
    /// File size in bytes (shared by all files)
    pub size: u64,
    /// Files in index insertion order
    pub files: Vec<FileDescriptor>,
}

impl DuplicateGroup {
    /// Create a new duplicate group.
    #[must_use]
    pub fn new(fingerprint: Fingerprint, files: Vec<FileDescriptor>) -> Self {
        let size = files.first().map_or(0, |f| f.size);
        Self {
            fingerprint,
            size,
            files,
        }
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of redundant copies (total - 1 keeper).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Space freed by removing every redundant copy.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicate_count() as u64
    }

    /// Fingerprint as hexadecimal string.
    #[must_use]
    pub fn fingerprint_hex(&self) -> String {
        hash_to_hex(&self.fingerprint)
    }

    /// Index of the file that survives under `policy`.
    fn keeper_index(&self, policy: KeepPolicy) -> usize {
        match policy {
            KeepPolicy::FirstSeen => 0,
            KeepPolicy::Lexicographic => self
                .files
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.path.cmp(&b.path))
                .map_or(0, |(i, _)| i),
        }
    }

    /// The file that survives under `policy`.
    ///
    /// # Panics
    ///
    /// Panics if the group is empty; groups built from a snapshot never are.
    #[must_use]
    pub fn keeper(&self, policy: KeepPolicy) -> &FileDescriptor {
        &self.files[self.keeper_index(policy)]
    }

    /// Every file except the keeper.
    #[must_use]
    pub fn redundant(&self, policy: KeepPolicy) -> Vec<&FileDescriptor> {
        let keep = self.keeper_index(policy);
        self.files
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != keep)
            .map(|(_, f)| f)
            .collect()
    }

    /// Get just the paths of files in this group.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Read-only view of a finished index.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    entries: HashMap<Fingerprint, Vec<FileDescriptor>>,
}

impl IndexSnapshot {
    /// Build a snapshot from raw entries.
    #[must_use]
    pub fn from_entries(entries: HashMap<Fingerprint, Vec<FileDescriptor>>) -> Self {
        Self { entries }
    }

    /// Files recorded for `fingerprint`, in insertion order.
    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&[FileDescriptor]> {
        self.entries.get(fingerprint).map(Vec::as_slice)
    }

    /// Number of distinct fingerprints, including singletons.
    #[must_use]
    pub fn fingerprint_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of files indexed.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    fn duplicate_lists(&self) -> impl Iterator<Item = (&Fingerprint, &Vec<FileDescriptor>)> {
        self.entries.iter().filter(|(_, files)| files.len() > 1)
    }

    /// Number of fingerprints shared by more than one file.
    #[must_use]
    pub fn duplicate_group_count(&self) -> usize {
        self.duplicate_lists().count()
    }

    /// `sum(len(group) - 1)` over duplicate groups.
    #[must_use]
    pub fn redundant_file_count(&self) -> usize {
        self.duplicate_lists().map(|(_, files)| files.len() - 1).sum()
    }

    /// Bytes that removing every redundant copy would free.
    #[must_use]
    pub fn reclaimable_bytes(&self) -> u64 {
        self.duplicate_lists()
            .map(|(_, files)| {
                let size = files.first().map_or(0, |f| f.size);
                size * (files.len() as u64 - 1)
            })
            .sum()
    }

    /// Duplicate groups, largest reclaimable space first.
    ///
    /// Ties are broken by fingerprint so the listing is stable for a given
    /// snapshot; the order of files inside a group is insertion order.
    #[must_use]
    pub fn duplicate_groups(&self) -> Vec<DuplicateGroup> {
        let mut groups: Vec<DuplicateGroup> = self
            .duplicate_lists()
            .map(|(fp, files)| DuplicateGroup::new(*fp, files.clone()))
            .collect();
        groups.sort_by(|a, b| {
            b.wasted_space()
                .cmp(&a.wasted_space())
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        groups
    }

    /// Content as fingerprint → set of paths, for order-insensitive comparison.
    #[must_use]
    pub fn path_sets(&self) -> BTreeMap<Fingerprint, BTreeSet<PathBuf>> {
        self.entries
            .iter()
            .map(|(fp, files)| (*fp, files.iter().map(|f| f.path.clone()).collect()))
            .collect()
    }
}
