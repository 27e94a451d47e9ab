//! Application configuration management.
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. `config.toml` from the platform config directory, or `--config PATH`
//! 3. Environment variables prefixed with `DUPSWEEP_` (e.g. `DUPSWEEP_MIN_SIZE=4096`)
//! 4. Command-line flags ([`Config::merge_cli`])
//!
//! # Example
//!
//! ```toml
//! min_size = 4096
//! name_pattern = "\\.jpe?g$"
//! ignore_patterns = ["node_modules", "*.tmp"]
//! threads = 4
//! algorithm = "sha256"
//! keep = "first-seen"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::duplicates::{
    compile_name_pattern, default_threads, FinderConfig, FinderError, KeepPolicy,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_SHARDS,
};
use crate::output::OutputFormat;
use crate::scanner::pattern::MATCH_ALL;
use crate::scanner::{HashAlgorithm, WalkerConfig, DEFAULT_BUFFER_SIZE};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DUPSWEEP_";

/// Configuration file name inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while loading or validating configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A layer failed to parse or had the wrong type for a key.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum file size in bytes (inclusive).
    pub min_size: u64,
    /// Maximum file size in bytes (inclusive).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    /// Filename regex; `*` matches everything.
    pub name_pattern: String,
    /// Gitignore-style globs excluded from discovery.
    pub ignore_patterns: Vec<String>,
    /// Worker count; unset means available parallelism.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    /// Work queue capacity; 0 means unbounded.
    pub queue_capacity: usize,
    pub algorithm: HashAlgorithm,
    /// Read buffer size in bytes.
    pub buffer_size: usize,
    /// Lock shards in the duplicate index; 1 is a single global lock.
    pub index_shards: usize,
    pub follow_symlinks: bool,
    pub skip_hidden: bool,
    /// Overall run deadline in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    pub keep: KeepPolicy,
    /// Draw the progress spinner and summary lines.
    pub progress: bool,
    pub output: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: None,
            name_pattern: MATCH_ALL.to_string(),
            ignore_patterns: Vec::new(),
            threads: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            algorithm: HashAlgorithm::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            index_shards: DEFAULT_SHARDS,
            follow_symlinks: false,
            skip_hidden: false,
            timeout_secs: None,
            keep: KeepPolicy::default(),
            progress: true,
            output: OutputFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// With `explicit` set, that file must exist. Otherwise the platform
    /// config file is used when present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] for a missing explicit file and
    /// [`ConfigError::Load`] when any layer fails to parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) if !path.is_file() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };

        if let Some(ref path) = path {
            log::debug!("Loading configuration from {}", path.display());
        }
        Self::figment(path.as_deref())
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Load from one file without consulting the platform directory.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// The figment stack below the CLI layer.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Platform config file path, e.g. `~/.config/dupsweep/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dupsweep").map(|d| d.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Apply command-line flags on top of the loaded layers.
    ///
    /// Only flags the user actually passed override file and environment values.
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(min) = cli.min_size {
            self.min_size = min;
        }
        if cli.max_size.is_some() {
            self.max_size = cli.max_size;
        }
        if let Some(ref name) = cli.name {
            self.name_pattern.clone_from(name);
        }
        self.ignore_patterns.extend(cli.ignore_patterns.iter().cloned());
        if cli.single_thread {
            self.threads = Some(1);
        } else if cli.threads.is_some() {
            self.threads = cli.threads;
        }
        if let Some(capacity) = cli.queue_capacity {
            self.queue_capacity = capacity;
        }
        if let Some(algorithm) = cli.algorithm {
            self.algorithm = algorithm;
        }
        if let Some(size) = cli.buffer_size {
            self.buffer_size = usize::try_from(size).unwrap_or(usize::MAX);
        }
        if let Some(shards) = cli.index_shards {
            self.index_shards = shards;
        }
        if cli.timeout.is_some() {
            self.timeout_secs = cli.timeout;
        }
        self.follow_symlinks |= cli.follow_symlinks;
        self.skip_hidden |= cli.skip_hidden;
        if let Some(keep) = cli.keep {
            self.keep = keep;
        }
        if cli.no_progress {
            self.progress = false;
        }
        if let Some(output) = cli.output {
            self.output = output;
        }
    }

    /// Reject values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == Some(0) {
            return Err(ConfigError::Invalid("threads must be at least 1".into()));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer_size must be at least 1".into()));
        }
        if self.index_shards == 0 {
            return Err(ConfigError::Invalid("index_shards must be at least 1".into()));
        }
        if let Some(max) = self.max_size {
            if max < self.min_size {
                return Err(ConfigError::Invalid(format!(
                    "max_size ({max}) is smaller than min_size ({})",
                    self.min_size
                )));
            }
        }
        Ok(())
    }

    /// Discovery filters, with the name pattern compiled.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::InvalidPattern`] if the pattern does not compile.
    pub fn walker_config(&self) -> Result<WalkerConfig, FinderError> {
        let mut walker = WalkerConfig::default()
            .with_min_size(self.min_size)
            .with_max_size(self.max_size)
            .with_name_pattern(compile_name_pattern(&self.name_pattern)?)
            .with_ignore_patterns(self.ignore_patterns.clone());
        walker.follow_symlinks = self.follow_symlinks;
        walker.skip_hidden = self.skip_hidden;
        Ok(walker)
    }

    /// Finder settings. Shutdown flag and progress are attached by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::InvalidPattern`] if the pattern does not compile.
    pub fn finder_config(&self) -> Result<FinderConfig, FinderError> {
        Ok(FinderConfig::default()
            .with_threads(self.threads.unwrap_or_else(default_threads))
            .with_queue_capacity(self.queue_capacity)
            .with_index_shards(self.index_shards)
            .with_walker_config(self.walker_config()?)
            .with_algorithm(self.algorithm)
            .with_buffer_size(self.buffer_size)
            .with_timeout(self.timeout_secs.map(Duration::from_secs)))
    }
}
