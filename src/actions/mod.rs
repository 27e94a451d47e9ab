//! File actions module.
//!
//! This module provides functionality for:
//! - Choosing which copy of each duplicate group survives
//! - Safe deletion via trash crate
//! - Permanent deletion (with explicit flag)
//!
//! ```no_run
//! use dupsweep::actions::delete::delete_to_trash;
//! use std::path::PathBuf;
//!
//! let path = PathBuf::from("/path/to/duplicate.txt");
//! let result = delete_to_trash(&path);
//! ```

pub mod delete;

// Re-export commonly used types
pub use delete::{
    delete_duplicates, delete_to_trash, delete_verified, permanent_delete, plan_deletions,
    validate_preserves_copy, BatchDeleteResult, DeleteConfig, DeleteError,
    DeleteProgressCallback, DeleteResult, DeletionPlan,
};
