//! Directory walker implementation using jwalk.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct, the single producer of the
//! scan pipeline. It traverses a root directory and turns every entry it
//! visits into a [`WalkEvent`]: either a [`FileDescriptor`] that passed the
//! inclusion filters, or a record of why the entry was not emitted.
//!
//! Per-entry failures (permission denied, entries vanishing mid-walk) are
//! yielded as [`ScanError`] values and never stop iteration. Only a root
//! that cannot be read at all is reported as
//! [`ScanError::RootUnreadable`], which the pipeline treats as fatal.
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::scanner::{Walker, WalkerConfig, WalkEvent};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Downloads"), WalkerConfig::default());
//! let files: Vec<_> = walker
//!     .walk()
//!     .filter_map(|event| match event {
//!         Ok(WalkEvent::File(file)) => Some(file),
//!         _ => None,
//!     })
//!     .collect();
//! println!("{} candidate files", files.len());
//! ```

use std::collections::HashSet;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::{file_name_of, FileDescriptor, ScanError, WalkerConfig};

/// Why a visited entry was not emitted as a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    /// The entry is a directory.
    Directory,
    /// A symlink that is not followed.
    Symlink,
    /// Not a regular file (socket, device, fifo).
    NotRegularFile,
    /// Matched an ignore glob.
    Ignored,
    /// Below the minimum size.
    TooSmall,
    /// Above the maximum size.
    TooLarge,
    /// Name does not match the filename pattern.
    NameMismatch,
}

/// One visited entry.
#[derive(Debug, Clone)]
pub enum WalkEvent {
    /// A regular file that passed every filter.
    File(FileDescriptor),
    /// An entry that was visited but not emitted.
    Filtered {
        /// Path of the entry
        path: PathBuf,
        /// Which filter rejected it
        reason: FilterReason,
    },
}

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
        }
    }

    /// The root this walker starts from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build gitignore matcher from config patterns and the root's .gitignore.
    fn build_gitignore(&self) -> Option<Gitignore> {
        if self.config.ignore_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if !gitignore.is_empty() => Some(gitignore),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Walk the directory tree, yielding one event per visited entry.
    ///
    /// The root itself is not reported. Ordering between runs is not
    /// guaranteed.
    pub fn walk(&self) -> impl Iterator<Item = Result<WalkEvent, ScanError>> + '_ {
        // A root that cannot be listed means there is no work source at all.
        let probe = fs::read_dir(&self.root).err().map(|e| {
            log::error!("Cannot read scan root {}: {}", self.root.display(), e);
            Err(ScanError::RootUnreadable {
                path: self.root.clone(),
                message: e.to_string(),
            })
        });

        let gitignore = self.build_gitignore().map(Arc::new);
        let entries = if probe.is_some() {
            None
        } else {
            Some(self.walk_dir(gitignore.clone()).into_iter())
        };

        // Directories whose listing failed; each is reported once, as an error.
        let mut unreadable_dirs: HashSet<PathBuf> = HashSet::new();

        probe.into_iter().chain(
            entries
                .into_iter()
                .flatten()
                .filter_map(move |entry_result| match entry_result {
                    Ok(mut entry) => {
                        let path = entry.path();

                        // Skip the root directory itself
                        if entry.depth == 0 {
                            return None;
                        }

                        if let Some(error) = entry.read_children_error.take() {
                            unreadable_dirs.insert(path.clone());
                            return Some(Err(self.handle_read_dir_error(&path, &error)));
                        }

                        Some(self.classify(path, entry.file_type(), gitignore.as_deref()))
                    }
                    Err(e) => {
                        if e.path().is_some_and(|p| unreadable_dirs.contains(p)) {
                            return None;
                        }
                        Some(Err(self.handle_jwalk_error(e)))
                    }
                }),
        )
    }

    /// Configure jwalk, pruning ignored directories before they are read.
    fn walk_dir(&self, gitignore: Option<Arc<Gitignore>>) -> WalkDir {
        let root = self.root.clone();

        WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });

                if let Some(gi) = gitignore.as_deref() {
                    for child in children.iter_mut().flatten() {
                        if child.file_type().is_dir()
                            && is_ignored(gi, &root, &child.path(), true)
                        {
                            child.read_children_path = None;
                        }
                    }
                }
            })
    }

    /// Turn one listed entry into a walk event.
    fn classify(
        &self,
        path: PathBuf,
        file_type: fs::FileType,
        gitignore: Option<&Gitignore>,
    ) -> Result<WalkEvent, ScanError> {
        let is_dir = file_type.is_dir();

        if gitignore.is_some_and(|gi| is_ignored(gi, &self.root, &path, is_dir)) {
            log::trace!("Ignoring: {}", path.display());
            return Ok(filtered(path, FilterReason::Ignored));
        }

        if is_dir {
            return Ok(filtered(path, FilterReason::Directory));
        }

        if file_type.is_symlink() && !self.config.follow_symlinks {
            log::trace!("Skipping symlink: {}", path.display());
            return Ok(filtered(path, FilterReason::Symlink));
        }

        let metadata = if self.config.follow_symlinks {
            fs::metadata(&path)
        } else {
            fs::symlink_metadata(&path)
        };

        match metadata {
            Ok(metadata) => Ok(self.process_file_entry(path, &metadata)),
            Err(e) => Err(self.handle_io_error(&path, e)),
        }
    }

    /// Apply the inclusion predicate to a file with known metadata.
    fn process_file_entry(&self, path: PathBuf, metadata: &Metadata) -> WalkEvent {
        if !metadata.is_file() {
            return filtered(path, FilterReason::NotRegularFile);
        }

        let size = metadata.len();
        let name = file_name_of(&path);

        if let Some(reason) = self.config.check(size, &name) {
            log::trace!(
                "Skipping file ({:?}, {} bytes): {}",
                reason,
                size,
                path.display()
            );
            return filtered(path, reason);
        }

        WalkEvent::File(FileDescriptor { path, size, name })
    }

    /// Handle I/O errors during metadata access.
    fn handle_io_error(&self, path: &Path, error: std::io::Error) -> ScanError {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path.to_path_buf())
            }
            ErrorKind::NotFound => {
                log::warn!("File vanished during walk: {}", path.display());
                ScanError::NotFound(path.to_path_buf())
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                ScanError::Io {
                    path: path.to_path_buf(),
                    source: error,
                }
            }
        }
    }

    /// A directory was listed by its parent but its own contents could not be read.
    fn handle_read_dir_error(&self, path: &Path, error: &jwalk::Error) -> ScanError {
        let kind = error
            .io_error()
            .map_or(std::io::ErrorKind::Other, std::io::Error::kind);
        self.handle_io_error(path, std::io::Error::new(kind, error.to_string()))
    }

    /// Handle jwalk errors.
    fn handle_jwalk_error(&self, error: jwalk::Error) -> ScanError {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        if error.depth() == 0 {
            log::error!("Cannot read scan root {}: {}", path.display(), error);
            return ScanError::RootUnreadable {
                path,
                message: error.to_string(),
            };
        }

        match error.io_error().map(std::io::Error::kind) {
            Some(kind) => self.handle_io_error(&path, std::io::Error::new(kind, error.to_string())),
            None => {
                log::warn!("Walker error for {}: {}", path.display(), error);
                ScanError::Io {
                    path,
                    source: std::io::Error::other(error.to_string()),
                }
            }
        }
    }
}

fn filtered(path: PathBuf, reason: FilterReason) -> WalkEvent {
    WalkEvent::Filtered { path, reason }
}

/// Match a path against ignore globs relative to the walk root.
fn is_ignored(gitignore: &Gitignore, root: &Path, path: &Path, is_dir: bool) -> bool {
    let relative_path = path.strip_prefix(root).unwrap_or(path);
    let path_str = relative_path.to_string_lossy();
    let normalized_path = if cfg!(windows) {
        path_str.replace('\\', "/")
    } else {
        path_str.into_owned()
    };

    gitignore
        .matched_path_or_any_parents(normalized_path, is_dir)
        .is_ignore()
}

/// Canonicalize scan roots and drop any root nested inside another.
///
/// Guarantees no file is discovered twice when overlapping roots are given.
/// Paths that cannot be canonicalized are kept as given.
///
/// # Examples
///
/// ```no_run
/// use dupsweep::scanner::normalize_roots;
/// use std::path::PathBuf;
///
/// let roots = normalize_roots(&[PathBuf::from("/data"), PathBuf::from("/data/photos")]);
/// assert_eq!(roots, vec![PathBuf::from("/data")]);
/// ```
#[must_use]
pub fn normalize_roots(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = paths
        .iter()
        .map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.clone()))
        .collect();
    roots.sort();
    roots.dedup();

    let mut kept: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for root in roots {
        if let Some(parent) = kept.iter().find(|k| root.starts_with(k)) {
            log::info!(
                "Skipping {} (already covered by {})",
                root.display(),
                parent.display()
            );
            continue;
        }
        kept.push(root);
    }
    kept
}
