//! Output formatters for duplicate scan results.
//!
//! This module provides different output formats for scan results:
//! - Text: one path per line, groups separated by a delimiter line
//! - JSON for automation and scripting
//!
//! Reporters only read the frozen index and the final counters; nothing
//! here feeds back into the scan.
//!
//! # Example
//!
//! ```no_run
//! use dupsweep::duplicates::DuplicateFinder;
//! use dupsweep::output::{ReportContext, TextOutput};
//! use std::path::PathBuf;
//!
//! let roots = vec![PathBuf::from(".")];
//! let report = DuplicateFinder::with_defaults().find_duplicates(&roots).unwrap();
//! let groups = report.index.duplicate_groups();
//! let context = ReportContext::new(roots);
//!
//! let output = TextOutput::new(&groups, &report.outcome, &context);
//! output.write_to(&mut std::io::stdout()).unwrap();
//! ```

pub mod json;
pub mod text;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::duplicates::KeepPolicy;
use crate::scanner::pattern::MATCH_ALL;

// Re-export main types
pub use json::JsonOutput;
pub use text::TextOutput;

/// Report format written to stdout.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable listing (default)
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Run parameters echoed in reports.
#[derive(Debug, Clone)]
pub struct ReportContext {
    /// Scanned roots
    pub roots: Vec<PathBuf>,
    /// Minimum size filter in bytes
    pub min_size: u64,
    /// Filename pattern source
    pub name_pattern: String,
    /// Keep policy used to order each group
    pub keep: KeepPolicy,
    /// Print the summary lines around the listing
    pub show_stats: bool,
}

impl ReportContext {
    /// Context with default filters for the given roots.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            min_size: 1,
            name_pattern: MATCH_ALL.to_string(),
            keep: KeepPolicy::default(),
            show_stats: true,
        }
    }

    /// Roots joined for display.
    #[must_use]
    pub fn roots_display(&self) -> String {
        self.roots
            .iter()
            .map(|r| r.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
