//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`Progress`] struct which implements [`ProgressCallback`]
//! to display a live spinner in the terminal while a scan runs.
//!
//! Progress is a pure observer: it only renders [`CountersSnapshot`] values
//! published by the aggregator and never feeds anything back into the
//! pipeline. A stale or skipped update has no effect on the result.

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::duplicates::CountersSnapshot;

/// Progress callback for the scan pipeline.
///
/// Implement this trait to receive progress updates during a run.
/// Every method is called from the aggregator thread.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (e.g., "scan")
    /// * `total` - Total number of items to process, or 0 if unknown
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called after each outcome is recorded.
    ///
    /// # Arguments
    ///
    /// * `counters` - Counters as of this outcome
    /// * `path` - Path the outcome refers to
    fn on_progress(&self, counters: &CountersSnapshot, path: &Path);

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called to update the progress message.
    fn on_message(&self, _message: &str) {}
}

/// Progress reporter using an indicatif spinner on stderr.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupsweep::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// assert!(progress.is_quiet());
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    /// Whether drawing is disabled.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if self.quiet {
            return;
        }
        let guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pb) = guard.as_ref() {
            f(pb);
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, _total: usize) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        pb.set_style(Self::style());
        pb.set_message(format!("({phase})"));
        pb.enable_steady_tick(Duration::from_millis(100));
        *self.bar.lock().unwrap_or_else(PoisonError::into_inner) = Some(pb);
    }

    fn on_progress(&self, counters: &CountersSnapshot, path: &Path) {
        self.with_bar(|pb| {
            pb.set_position(counters.reported());
            pb.set_message(format!(
                "{} hashed, {} skipped, {} errored, {} queued {}",
                counters.hashed,
                counters.skipped,
                counters.errored(),
                counters.in_flight(),
                truncate_path(&path.to_string_lossy(), 30)
            ));
        });
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        if let Some(pb) = self
            .bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pb.finish_and_clear();
            log::debug!("Phase '{}' finished after {:?}", phase, pb.elapsed());
        }
    }

    fn on_message(&self, message: &str) {
        self.with_bar(|pb| pb.set_message(message.to_string()));
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len >= max_len {
        let tail: String = file_name.chars().skip(name_len + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
