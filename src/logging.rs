//! Logging setup on top of the `log` facade and `env_logger`.
//!
//! Level priority:
//!
//! 1. `RUST_LOG` (if set)
//! 2. `--quiet` (errors only) or `--verbose` (`-v` debug, `-vv` trace)
//! 3. Default: info
//!
//! Logs go to stderr so that stdout carries only the report. Per-file
//! failures are logged at `warn`; worker lifecycle at `debug`; per-item
//! work at `trace`.

use std::env;
use std::io::Write;

use env_logger::{Builder, Target};
use log::LevelFilter;

/// Initialize the global logger from CLI verbosity flags.
///
/// Calling it again is harmless: later calls are ignored.
///
/// ```rust,no_run
/// use dupsweep::logging::init_logging;
///
/// init_logging(1, false);
/// log::debug!("visible with -v");
/// ```
pub fn init_logging(verbose: u8, quiet: bool) {
    let from_env = env::var("RUST_LOG").is_ok();

    let mut builder = Builder::new();
    builder.target(Target::Stderr);
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }
    configure_format(&mut builder);

    if builder.try_init().is_err() {
        return;
    }
    if from_env {
        log::debug!("Logging configured from RUST_LOG");
    } else {
        log::debug!("Logging initialized at level {}", log::max_level());
    }
}

/// Log level implied by the CLI flags. `quiet` wins over `verbose`.
#[must_use]
pub fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

// Debug builds carry a timestamp and the module path; release builds stay compact.
fn configure_format(builder: &mut Builder) {
    #[cfg(debug_assertions)]
    builder.format(|buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        writeln!(
            buf,
            "{} {style}{:<5}{style:#} [{}] {}",
            buf.timestamp_millis(),
            level,
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    #[cfg(not(debug_assertions))]
    builder.format(|buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
    });
}
