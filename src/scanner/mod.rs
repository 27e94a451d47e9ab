//! Scanner module for file discovery and content fingerprinting.
//!
//! This module provides functionality for:
//! - Sequential discovery of candidate files using jwalk
//! - Inclusion filters (minimum/maximum size, filename pattern, ignore globs)
//! - Content fingerprinting (BLAKE3 or SHA-256) with a bounded read buffer
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`pattern`]: Filename pattern matching
//! - [`hasher`]: Streaming fingerprint function
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::scanner::{Walker, WalkerConfig, WalkEvent};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     min_size: 1024,
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("."), config);
//! for event in walker.walk() {
//!     match event {
//!         Ok(WalkEvent::File(file)) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Ok(_) => {}
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod pattern;
pub mod walker;

use std::path::{Path, PathBuf};

// Re-export main types
pub use hasher::{
    hash_to_hex, Fingerprint, Fingerprinter, HashAlgorithm, Hasher, DEFAULT_BUFFER_SIZE,
    FINGERPRINT_LEN,
};
pub use pattern::NamePattern;
pub use walker::{normalize_roots, FilterReason, WalkEvent, Walker};

/// A candidate file produced by discovery.
///
/// Created once by the walker and owned by the work queue until exactly
/// one worker takes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct FileDescriptor {
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes at discovery time
    pub size: u64,
    /// Final path component, used for pattern matching
    pub name: String,
}

impl FileDescriptor {
    /// Create a descriptor, deriving `name` from the last path component.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        let name = file_name_of(&path);
        Self { path, size, name }
    }
}

/// Lossy final component of a path, or an empty string.
pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Inclusion filters and traversal options for discovery.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Minimum file size to include (in bytes, inclusive).
    pub min_size: u64,

    /// Maximum file size to include (in bytes, inclusive).
    pub max_size: Option<u64>,

    /// Filename pattern; files whose name does not match are filtered out.
    pub name_pattern: NamePattern,

    /// Glob patterns to ignore (gitignore-style).
    pub ignore_patterns: Vec<String>,

    /// Follow symbolic links during traversal.
    /// Warning: May cause infinite loops with symlink cycles.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: None,
            name_pattern: NamePattern::Any,
            ignore_patterns: Vec::new(),
            follow_symlinks: false,
            skip_hidden: false,
        }
    }
}

impl WalkerConfig {
    /// Set the minimum size filter.
    #[must_use]
    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    /// Set the maximum size filter.
    #[must_use]
    pub fn with_max_size(mut self, max_size: Option<u64>) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the filename pattern.
    #[must_use]
    pub fn with_name_pattern(mut self, pattern: NamePattern) -> Self {
        self.name_pattern = pattern;
        self
    }

    /// Set the ignore globs.
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// The inclusion predicate `(size, name) -> bool`.
    ///
    /// Returns the reason a file is excluded, or `None` if it passes.
    #[must_use]
    pub fn check(&self, size: u64, name: &str) -> Option<FilterReason> {
        if size < self.min_size {
            return Some(FilterReason::TooSmall);
        }
        if self.max_size.is_some_and(|max| size > max) {
            return Some(FilterReason::TooLarge);
        }
        if !self.name_pattern.is_match(name) {
            return Some(FilterReason::NameMismatch);
        }
        None
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The entry vanished between listing and inspection.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The root itself could not be read; nothing below it can be discovered.
    #[error("Cannot read scan root {path}: {message}")]
    RootUnreadable {
        /// The root that failed
        path: PathBuf,
        /// Description of the failure
        message: String,
    },

    /// An I/O error occurred while accessing an entry.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Whether this error means the work source itself is broken.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RootUnreadable { .. })
    }

    /// The path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) => p,
            Self::RootUnreadable { path, .. } | Self::Io { path, .. } => path,
        }
    }
}

/// Errors that can occur while fingerprinting one file.
///
/// Every variant is recoverable: the file is counted as errored and left
/// out of the index.
#[derive(thiserror::Error, Debug, Clone)]
pub enum HashError {
    /// The file was not found when the worker opened it.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when opening or reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The number of bytes read differs from the size seen at discovery.
    #[error("File changed during scan: {path} (expected {expected} bytes, read {actual})")]
    SizeChanged {
        /// Path of the changed file
        path: PathBuf,
        /// Size recorded at discovery
        expected: u64,
        /// Bytes actually streamed
        actual: u64,
    },

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying error message
        message: String,
    },
}

impl HashError {
    /// Classify an I/O error raised for `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: &std::io::Error) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                message: error.to_string(),
            },
        }
    }

    /// The path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) => p,
            Self::SizeChanged { path, .. } | Self::Io { path, .. } => path,
        }
    }
}
