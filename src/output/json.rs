//! JSON output formatter for duplicate scan results.
//!
//! Provides machine-readable JSON output for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "generated_at": "2024-01-01T00:00:00Z",
//!   "roots": ["/data"],
//!   "duplicates": [
//!     {
//!       "fingerprint": "abc123...",
//!       "size": 1024,
//!       "keeper": "/data/a.txt",
//!       "files": ["/data/a.txt", "/data/b.txt"]
//!     }
//!   ],
//!   "summary": {
//!     "visited": 3,
//!     "hashed": 3,
//!     "skipped": 0,
//!     "errored": 0,
//!     "duplicate_groups": 1,
//!     "redundant_files": 1,
//!     "reclaimable_bytes": 1024,
//!     "reclaimable_display": "1.0 KiB",
//!     "duration_ms": 12,
//!     "exit_code": 0,
//!     "exit_code_name": "DS000"
//!   }
//! }
//! ```

use std::io::Write;

use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ReportContext;
use crate::actions::BatchDeleteResult;
use crate::duplicates::{DuplicateGroup, KeepPolicy, RunOutcome};
use crate::error::ExitCode;

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// Fingerprint as hexadecimal string (64 characters)
    pub fingerprint: String,
    /// File size in bytes
    pub size: u64,
    /// Path that survives deletion under the active keep policy
    pub keeper: String,
    /// Paths of all files in the group, keeper first
    pub files: Vec<String>,
}

impl JsonDuplicateGroup {
    /// Create a JSON duplicate group from a DuplicateGroup.
    #[must_use]
    pub fn from_duplicate_group(group: &DuplicateGroup, keep: KeepPolicy) -> Self {
        let keeper = group.keeper(keep).path.to_string_lossy().into_owned();
        let mut files = vec![keeper.clone()];
        files.extend(
            group
                .redundant(keep)
                .iter()
                .map(|f| f.path.to_string_lossy().into_owned()),
        );
        Self {
            fingerprint: group.fingerprint_hex(),
            size: group.size,
            keeper,
            files,
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Counters and derived totals
    #[serde(flatten)]
    pub outcome: RunOutcome,
    /// Reclaimable space, human readable
    pub reclaimable_display: String,
    /// Duration of the scan in milliseconds
    pub duration_ms: u64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DS000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Create a JSON summary from run counters and an exit code.
    #[must_use]
    pub fn new(outcome: &RunOutcome, exit_code: ExitCode) -> Self {
        Self {
            outcome: *outcome,
            reclaimable_display: ByteSize::b(outcome.reclaimable_bytes).to_string(),
            duration_ms: u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Deletion results in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDeletions {
    /// Paths removed
    pub deleted: Vec<String>,
    /// Paths that could not be removed, with the reason
    pub failed: Vec<(String, String)>,
    /// Bytes freed
    pub bytes_freed: u64,
}

impl From<&BatchDeleteResult> for JsonDeletions {
    fn from(result: &BatchDeleteResult) -> Self {
        Self {
            deleted: result
                .successes
                .iter()
                .map(|s| s.path.to_string_lossy().into_owned())
                .collect(),
            failed: result
                .failures
                .iter()
                .map(|(p, e)| (p.to_string_lossy().into_owned(), e.clone()))
                .collect(),
            bytes_freed: result.bytes_freed,
        }
    }
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
    /// Scanned roots
    pub roots: Vec<String>,
    /// List of duplicate groups
    pub duplicates: Vec<JsonDuplicateGroup>,
    /// Scan summary statistics
    pub summary: JsonSummary,
    /// Deletion results, when deletion ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletions: Option<JsonDeletions>,
}

impl JsonOutput {
    /// Create a new JSON output from duplicate groups, counters and exit code.
    ///
    /// # Example
    ///
    /// ```
    /// use dupsweep::duplicates::RunOutcome;
    /// use dupsweep::error::ExitCode;
    /// use dupsweep::output::{JsonOutput, ReportContext};
    /// use std::path::PathBuf;
    ///
    /// let context = ReportContext::new(vec![PathBuf::from("/data")]);
    /// let output = JsonOutput::new(&[], &RunOutcome::default(), &context, ExitCode::Success);
    /// assert!(output.duplicates.is_empty());
    /// assert_eq!(output.summary.exit_code_name, "DS000");
    /// ```
    #[must_use]
    pub fn new(
        groups: &[DuplicateGroup],
        outcome: &RunOutcome,
        context: &ReportContext,
        exit_code: ExitCode,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            roots: context
                .roots
                .iter()
                .map(|r| r.to_string_lossy().into_owned())
                .collect(),
            duplicates: groups
                .iter()
                .map(|g| JsonDuplicateGroup::from_duplicate_group(g, context.keep))
                .collect(),
            summary: JsonSummary::new(outcome, exit_code),
            deletions: None,
        }
    }

    /// Attach deletion results.
    #[must_use]
    pub fn with_deletions(mut self, deletions: &BatchDeleteResult) -> Self {
        self.deletions = Some(deletions.into());
        self
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
