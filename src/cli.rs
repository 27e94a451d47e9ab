//! Command-line interface definitions for dupsweep.
//!
//! Every scan option is optional at this layer so that unset flags fall
//! through to the config file and environment (see [`crate::config`]).
//!
//! # Example
//!
//! ```bash
//! # List duplicates under two trees
//! dupsweep ~/Pictures /mnt/backup/Pictures
//!
//! # Only JPEGs of at least 1 MiB, machine-readable output
//! dupsweep ~/Pictures --name '\.jpe?g$' --min-size 1MiB --output json
//!
//! # Reproduce a sequential run and move redundant copies to the trash
//! dupsweep ~/Downloads --single-thread --delete
//! ```

use std::path::PathBuf;

use clap::Parser;

use crate::duplicates::KeepPolicy;
use crate::output::OutputFormat;
use crate::scanner::HashAlgorithm;

/// Concurrent duplicate file finder.
///
/// dupsweep walks one or more directories, fingerprints candidate files on a
/// pool of worker threads, and lists every group of files with identical
/// content.
#[derive(Debug, Parser)]
#[command(name = "dupsweep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directories to scan
    #[arg(value_name = "PATH", required = true, num_args = 1..)]
    pub paths: Vec<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as a JSON object on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Minimum file size to consider (e.g., 1KB, 1MiB). Default: 1 byte
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to consider (e.g., 1GB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Only consider files whose name matches this regex (`*` matches all)
    #[arg(short, long, value_name = "PATTERN")]
    pub name: Option<String>,

    /// Glob patterns to ignore (can be specified multiple times)
    #[arg(short, long = "ignore", value_name = "GLOB")]
    pub ignore_patterns: Vec<String>,

    /// Number of hashing workers (default: available parallelism)
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Hash on a single worker
    #[arg(long, conflicts_with = "threads")]
    pub single_thread: bool,

    /// Capacity of the work queue between discovery and workers (0 = unbounded)
    #[arg(long, value_name = "N")]
    pub queue_capacity: Option<usize>,

    /// Fingerprint algorithm
    #[arg(long, value_enum)]
    pub algorithm: Option<HashAlgorithm>,

    /// Read buffer size per worker (e.g., 64KiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub buffer_size: Option<u64>,

    /// Lock shards in the duplicate index (1 = single global lock)
    #[arg(long, value_name = "N")]
    pub index_shards: Option<usize>,

    /// Abort the run after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Follow symbolic links during scan
    ///
    /// Warning: May cause infinite loops if symlinks form cycles.
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Disable the progress spinner and summary lines
    #[arg(long, alias = "nostats")]
    pub no_progress: bool,

    /// Remove every copy but one in each duplicate group (moves to trash)
    #[arg(short, long)]
    pub delete: bool,

    /// Use permanent deletion instead of moving to trash
    ///
    /// Warning: Files cannot be recovered after permanent deletion.
    #[arg(long, requires = "delete")]
    pub permanent: bool,

    /// Which copy of each group is kept
    #[arg(long, value_enum, value_name = "POLICY")]
    pub keep: Option<KeepPolicy>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Configuration file (default: platform config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use dupsweep::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    if num < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
