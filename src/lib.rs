//! dupsweep - Concurrent Duplicate File Finder
//!
//! Walks one or more directory trees, fingerprints candidate files on a
//! fixed pool of worker threads fed through a bounded queue, and reports
//! every group of files with identical content.
//!
//! The pipeline lives in [`duplicates`]; [`scanner`] provides discovery and
//! fingerprinting; [`output`] and [`actions`] consume the frozen result.

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use anyhow::Context;

use crate::actions::{delete_duplicates, DeleteConfig};
use crate::cli::Cli;
use crate::config::Config;
use crate::duplicates::{validate_roots, DuplicateFinder};
use crate::error::ExitCode;
use crate::output::{JsonOutput, OutputFormat, ReportContext, TextOutput};
use crate::progress::Progress;

/// Run a scan as described by the parsed command line.
///
/// Returns the exit code for a completed run. Startup validation failures,
/// interruption, and pool-fatal errors come back as `Err`; classify them with
/// [`ExitCode::from_error`].
///
/// # Errors
///
/// Returns an error if configuration is invalid, a root is missing, the
/// name pattern does not compile, the run is interrupted or stops on a fatal
/// error, or the report cannot be written.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color || !io::stdout().is_terminal() {
        yansi::disable();
    }

    let mut config = Config::load(cli.config.as_deref())?;
    config.merge_cli(&cli);
    config.validate()?;
    log::debug!("Effective configuration: {config:?}");

    validate_roots(&cli.paths)?;

    let handler = signal::install_handler().context("Failed to set up Ctrl+C handling")?;
    let show_stats = config.progress && !cli.quiet;
    let mut finder_config = config.finder_config()?.with_shutdown_flag(handler.flag());
    if show_stats {
        finder_config = finder_config.with_progress_callback(Arc::new(Progress::new(false)));
    }

    let context = ReportContext {
        roots: cli.paths.clone(),
        min_size: config.min_size,
        name_pattern: config.name_pattern.clone(),
        keep: config.keep,
        show_stats,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if show_stats && config.output == OutputFormat::Text {
        writeln!(
            out,
            "Searching duplicates in '{}' with name that match '{}' and minimum size '{}' bytes",
            context.roots_display(),
            context.name_pattern,
            context.min_size
        )?;
        out.flush()?;
    }

    let report = DuplicateFinder::new(finder_config).find_duplicates(&cli.paths)?;
    let groups = report.index.duplicate_groups();

    let deletions = if cli.delete {
        let delete_config = if cli.permanent {
            DeleteConfig::permanent()
        } else {
            DeleteConfig::default()
        }
        .with_keep(config.keep);
        Some(delete_duplicates(&groups, &delete_config, None))
    } else {
        None
    };

    match config.output {
        OutputFormat::Text => {
            let mut text = TextOutput::new(&groups, &report.outcome, &context);
            if let Some(ref deletions) = deletions {
                text = text.with_deletions(deletions);
            }
            text.write_to(&mut out).context("Failed to write report")?;
        }
        OutputFormat::Json => {
            let mut json = JsonOutput::new(&groups, &report.outcome, &context, ExitCode::Success);
            if let Some(ref deletions) = deletions {
                json = json.with_deletions(deletions);
            }
            json.write_to(&mut out, true)
                .context("Failed to write JSON report")?;
        }
    }

    Ok(ExitCode::Success)
}
