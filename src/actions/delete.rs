//! Removal of redundant duplicate copies.
//!
//! # Overview
//!
//! Given the duplicate groups of a finished scan, this module keeps one file
//! per group, chosen by a [`KeepPolicy`], and removes the rest:
//! - Move to system trash (default, recoverable)
//! - Permanent deletion (with explicit flag)
//!
//! # Safety
//!
//! Before removing a copy, its current size is checked against the size
//! recorded at scan time, and the keeper must still exist. A group is never
//! emptied. Failures are logged and collected; they never abort the batch.
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::actions::delete::{delete_duplicates, DeleteConfig};
//! use dupsweep::duplicates::DuplicateGroup;
//!
//! let groups: Vec<DuplicateGroup> = Vec::new();
//! let result = delete_duplicates(&groups, &DeleteConfig::default(), None);
//! println!("{}", result.summary());
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use thiserror::Error;

use crate::duplicates::{DuplicateGroup, KeepPolicy};
use crate::scanner::FileDescriptor;

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File size changed since the scan.
    #[error("file modified since scan: {path} (was {expected} bytes, now {actual})")]
    Modified {
        /// Path of the file
        path: PathBuf,
        /// Size at scan time
        expected: u64,
        /// Current size
        actual: u64,
    },

    /// The copy that should survive is gone.
    #[error("kept copy no longer exists: {0}")]
    KeeperMissing(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// Path of the file
        path: PathBuf,
        /// Error reported by the platform trash
        message: String,
    },

    /// Permanent delete operation failed.
    #[error("permanent delete failed for {path}: {message}")]
    PermanentDeleteFailed {
        /// Path of the file
        path: PathBuf,
        /// Underlying error text
        message: String,
    },

    /// Attempted to delete all copies (at least one must be preserved).
    #[error("cannot delete all copies - at least one file must be preserved")]
    AllCopiesWouldBeDeleted,

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path of the file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Get the path associated with this error (if any).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::KeeperMissing(p)
            | Self::Modified { path: p, .. }
            | Self::TrashFailed { path: p, .. }
            | Self::PermanentDeleteFailed { path: p, .. }
            | Self::Io { path: p, .. } => Some(p),
            Self::AllCopiesWouldBeDeleted => None,
        }
    }

    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Result of a successful deletion operation.
#[derive(Debug, Clone)]
pub struct DeleteResult {
    /// Path that was deleted.
    pub path: PathBuf,
    /// Size of the deleted file in bytes.
    pub size: u64,
    /// Whether deletion was permanent (true) or to trash (false).
    pub permanent: bool,
}

/// Results of a batch deletion operation.
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteResult {
    /// Successfully deleted files.
    pub successes: Vec<DeleteResult>,
    /// Failed deletions with their errors.
    pub failures: Vec<(PathBuf, String)>,
    /// Total bytes freed.
    pub bytes_freed: u64,
}

impl BatchDeleteResult {
    /// Number of successful deletions.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    /// Number of failed deletions.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Check if all deletions succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!(
                "Deleted {} file(s), freed {}",
                self.success_count(),
                ByteSize::b(self.bytes_freed)
            )
        } else {
            format!(
                "Deleted {} file(s), {} failed, freed {}",
                self.success_count(),
                self.failure_count(),
                ByteSize::b(self.bytes_freed)
            )
        }
    }
}

/// Configuration for deletion operations.
#[derive(Debug, Clone, Default)]
pub struct DeleteConfig {
    /// Use permanent deletion instead of trash.
    pub permanent: bool,
    /// Which copy of each group survives.
    pub keep: KeepPolicy,
}

impl DeleteConfig {
    /// Create config for permanent deletion.
    #[must_use]
    pub fn permanent() -> Self {
        Self {
            permanent: true,
            ..Self::default()
        }
    }

    /// Set the keep policy.
    #[must_use]
    pub fn with_keep(mut self, keep: KeepPolicy) -> Self {
        self.keep = keep;
        self
    }
}

/// Callback trait for deletion progress reporting.
pub trait DeleteProgressCallback: Send + Sync {
    /// Called after successful deletion.
    fn on_delete_success(&self, path: &Path, size: u64);

    /// Called after failed deletion.
    fn on_delete_failure(&self, path: &Path, error: &str);
}

/// Which file of a group survives and which are removed.
#[derive(Debug, Clone)]
pub struct DeletionPlan {
    /// Surviving copy
    pub keep: FileDescriptor,
    /// Copies to remove
    pub remove: Vec<FileDescriptor>,
}

/// Decide keeper and removals for every group.
///
/// # Example
///
/// ```
/// use dupsweep::actions::delete::plan_deletions;
/// use dupsweep::duplicates::{DuplicateGroup, KeepPolicy};
/// use dupsweep::scanner::FileDescriptor;
/// use std::path::PathBuf;
///
/// let group = DuplicateGroup::new([0u8; 32], vec![
///     FileDescriptor::new(PathBuf::from("/b/copy.txt"), 5),
///     FileDescriptor::new(PathBuf::from("/a/original.txt"), 5),
/// ]);
///
/// let plans = plan_deletions(&[group], KeepPolicy::Lexicographic);
/// assert_eq!(plans[0].keep.path, PathBuf::from("/a/original.txt"));
/// assert_eq!(plans[0].remove.len(), 1);
/// ```
#[must_use]
pub fn plan_deletions(groups: &[DuplicateGroup], policy: KeepPolicy) -> Vec<DeletionPlan> {
    groups
        .iter()
        .filter(|g| g.len() > 1)
        .map(|group| DeletionPlan {
            keep: group.keeper(policy).clone(),
            remove: group.redundant(policy).into_iter().cloned().collect(),
        })
        .collect()
}

/// Validate that a selection doesn't delete all copies.
///
/// # Errors
///
/// Returns `AllCopiesWouldBeDeleted` if no path of the group would remain.
///
/// # Example
///
/// ```
/// use dupsweep::actions::delete::validate_preserves_copy;
/// use std::path::PathBuf;
///
/// let group = vec![PathBuf::from("/original.txt"), PathBuf::from("/copy1.txt")];
///
/// assert!(validate_preserves_copy(&[PathBuf::from("/copy1.txt")], &group).is_ok());
/// assert!(validate_preserves_copy(&group, &group).is_err());
/// ```
pub fn validate_preserves_copy(
    selected_paths: &[PathBuf],
    group_paths: &[PathBuf],
) -> Result<(), DeleteError> {
    let selected_set: HashSet<&PathBuf> = selected_paths.iter().collect();
    let preserved_count = group_paths
        .iter()
        .filter(|p| !selected_set.contains(p))
        .count();

    if preserved_count == 0 {
        log::error!(
            "Attempted to delete all {} copies of a duplicate group",
            group_paths.len()
        );
        Err(DeleteError::AllCopiesWouldBeDeleted)
    } else {
        Ok(())
    }
}

/// Delete a single file to the system trash.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if deletion is not allowed
/// - `TrashFailed` if the trash operation fails
pub fn delete_to_trash(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = fs::metadata(path)
        .map_err(|e| DeleteError::from_io(path, e))?
        .len();

    trash::delete(path).map_err(|e| {
        log::error!("Trash operation failed for {}: {}", path.display(), e);
        DeleteError::TrashFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Moved to trash: {} ({} bytes)", path.display(), size);

    Ok(DeleteResult {
        path: path.to_path_buf(),
        size,
        permanent: false,
    })
}

/// Permanently delete a single file.
///
/// **WARNING**: This operation cannot be undone.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if deletion is not allowed
/// - `PermanentDeleteFailed` if the delete operation fails
pub fn permanent_delete(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = fs::metadata(path)
        .map_err(|e| DeleteError::from_io(path, e))?
        .len();

    fs::remove_file(path).map_err(|e| {
        log::error!("Permanent delete failed for {}: {}", path.display(), e);
        DeleteError::PermanentDeleteFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Permanently deleted: {} ({} bytes)", path.display(), size);

    Ok(DeleteResult {
        path: path.to_path_buf(),
        size,
        permanent: true,
    })
}

/// Delete one scanned file after checking it still has its scanned size.
///
/// # Errors
///
/// - `Modified` if the size differs from the scan
/// - Other errors from `delete_to_trash` or `permanent_delete`
pub fn delete_verified(file: &FileDescriptor, permanent: bool) -> Result<DeleteResult, DeleteError> {
    let actual = fs::metadata(&file.path)
        .map_err(|e| DeleteError::from_io(&file.path, e))?
        .len();

    if actual != file.size {
        log::warn!(
            "File modified since scan: {} (size changed from {} to {})",
            file.path.display(),
            file.size,
            actual
        );
        return Err(DeleteError::Modified {
            path: file.path.clone(),
            expected: file.size,
            actual,
        });
    }

    if permanent {
        permanent_delete(&file.path)
    } else {
        delete_to_trash(&file.path)
    }
}

/// Remove every redundant copy, keeping one file per group.
///
/// Processes all groups; a failure on one file is recorded and the batch
/// continues.
pub fn delete_duplicates(
    groups: &[DuplicateGroup],
    config: &DeleteConfig,
    callback: Option<&dyn DeleteProgressCallback>,
) -> BatchDeleteResult {
    let mut result = BatchDeleteResult::default();

    for plan in plan_deletions(groups, config.keep) {
        let selected: Vec<PathBuf> = plan.remove.iter().map(|f| f.path.clone()).collect();
        let mut group_paths = selected.clone();
        group_paths.push(plan.keep.path.clone());

        let guard = validate_preserves_copy(&selected, &group_paths).and_then(|()| {
            if plan.keep.path.exists() {
                Ok(())
            } else {
                Err(DeleteError::KeeperMissing(plan.keep.path.clone()))
            }
        });

        if let Err(e) = guard {
            log::warn!("Skipping group kept at {}: {}", plan.keep.path.display(), e);
            let message = e.to_string();
            for path in selected {
                if let Some(cb) = callback {
                    cb.on_delete_failure(&path, &message);
                }
                result.failures.push((path, message.clone()));
            }
            continue;
        }

        for file in &plan.remove {
            match delete_verified(file, config.permanent) {
                Ok(deleted) => {
                    result.bytes_freed += deleted.size;
                    if let Some(cb) = callback {
                        cb.on_delete_success(&deleted.path, deleted.size);
                    }
                    result.successes.push(deleted);
                }
                Err(e) => {
                    let error_msg = e.to_string();
                    log::warn!("Failed to delete {}: {}", file.path.display(), error_msg);
                    if let Some(cb) = callback {
                        cb.on_delete_failure(&file.path, &error_msg);
                    }
                    result.failures.push((file.path.clone(), error_msg));
                }
            }
        }
    }

    log::info!("{}", result.summary());
    result
}
