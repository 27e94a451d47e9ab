//! Plain-text report.
//!
//! Layout:
//!
//! ```text
//! Found 1 duplicates from 3 files in /data with options { size: '1', name: '*' }
//! /data/a.txt
//! /data/b.txt
//! ---------
//! Found 1 duplicates from 3 files in /data with options { size: '1', name: '*' }
//! ```
//!
//! Each group lists its keeper first. When deletions were performed, the
//! removed copies are prefixed with `Deleted`. The summary lines are
//! omitted when stats are disabled. Colors come from `yansi` and are turned
//! off globally by the caller for `--no-color` or non-terminal output.

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::Path;

use bytesize::ByteSize;
use yansi::Paint;

use super::ReportContext;
use crate::actions::BatchDeleteResult;
use crate::duplicates::{DuplicateGroup, RunOutcome};

/// Separator printed after every group.
pub const GROUP_DELIMITER: &str = "---------";

/// Text formatter over a finished run.
#[derive(Debug)]
pub struct TextOutput<'a> {
    groups: &'a [DuplicateGroup],
    outcome: &'a RunOutcome,
    context: &'a ReportContext,
    deletions: Option<&'a BatchDeleteResult>,
}

impl<'a> TextOutput<'a> {
    /// Create a formatter.
    #[must_use]
    pub fn new(
        groups: &'a [DuplicateGroup],
        outcome: &'a RunOutcome,
        context: &'a ReportContext,
    ) -> Self {
        Self {
            groups,
            outcome,
            context,
            deletions: None,
        }
    }

    /// Mark paths removed by a deletion batch.
    #[must_use]
    pub fn with_deletions(mut self, deletions: &'a BatchDeleteResult) -> Self {
        self.deletions = Some(deletions);
        self
    }

    /// The summary line printed before and after the listing.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "Found {} duplicates from {} files in {} with options {{ size: '{}', name: '{}' }}",
            self.outcome.duplicate_groups,
            self.outcome.candidates(),
            self.context.roots_display(),
            self.context.min_size,
            self.context.name_pattern
        )
    }

    /// Counter detail printed under the closing summary.
    #[must_use]
    pub fn detail_line(&self) -> String {
        format!(
            "{} hashed, {} skipped, {} errored, {} redundant files, {} reclaimable ({:.2?})",
            self.outcome.hashed,
            self.outcome.skipped,
            self.outcome.errored,
            self.outcome.redundant_files,
            ByteSize::b(self.outcome.reclaimable_bytes),
            self.outcome.elapsed
        )
    }

    /// Write the full report.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        if self.context.show_stats {
            writeln!(writer, "{}", self.summary_line().bold())?;
            writeln!(writer)?;
        }

        let removed: HashSet<&Path> = self
            .deletions
            .map(|d| d.successes.iter().map(|s| s.path.as_path()).collect())
            .unwrap_or_default();

        for group in self.groups {
            let keeper = group.keeper(self.context.keep);
            writeln!(writer, "{}", keeper.path.display().green())?;
            for file in group.redundant(self.context.keep) {
                if removed.contains(file.path.as_path()) {
                    writeln!(writer, "{} {}", "Deleted".red(), file.path.display())?;
                } else {
                    writeln!(writer, "{}", file.path.display())?;
                }
            }
            writeln!(writer, "{}", GROUP_DELIMITER.dim())?;
        }

        if self.context.show_stats {
            writeln!(writer)?;
            writeln!(writer, "{}", self.summary_line().bold())?;
            writeln!(writer, "{}", self.detail_line())?;
            if let Some(deletions) = self.deletions {
                writeln!(writer, "{}", deletions.summary())?;
            }
        }

        Ok(())
    }
}
