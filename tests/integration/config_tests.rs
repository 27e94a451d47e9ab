use std::path::Path;

use clap::Parser;
use dupsweep::cli::Cli;
use dupsweep::config::{Config, ConfigError};
use dupsweep::duplicates::KeepPolicy;
use dupsweep::output::OutputFormat;
use dupsweep::scanner::HashAlgorithm;
use figment::providers::{Format, Serialized, Toml};
use figment::{Figment, Jail};

#[test]
fn test_config_load_defaults() {
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();
    assert_eq!(config.min_size, 1);
    assert_eq!(config.name_pattern, "*");
    assert_eq!(config.algorithm, HashAlgorithm::Blake3);
    assert_eq!(config.keep, KeepPolicy::Lexicographic);
    assert_eq!(config.output, OutputFormat::Text);
    assert!(config.threads.is_none());
}

#[test]
fn test_config_load_from_env() {
    Jail::expect_with(|jail| {
        jail.set_env("DUPSWEEP_THREADS", "16");
        jail.set_env("DUPSWEEP_OUTPUT", "json");
        jail.set_env("DUPSWEEP_SKIP_HIDDEN", "true");

        let config: Config = Config::figment(None).extract()?;

        assert_eq!(config.threads, Some(16));
        assert_eq!(config.output, OutputFormat::Json);
        assert!(config.skip_hidden);
        Ok(())
    });
}

#[test]
fn test_config_load_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "dupsweep.toml",
            r#"
min_size = 4096
max_size = 1048576
name_pattern = '\.jpe?g$'
ignore_patterns = ["node_modules", "*.tmp"]
queue_capacity = 0
index_shards = 1
timeout_secs = 30
follow_symlinks = true
progress = false
"#,
        )?;

        let config = Config::load_from_path(Path::new("dupsweep.toml")).unwrap();

        assert_eq!(config.min_size, 4096);
        assert_eq!(config.max_size, Some(1_048_576));
        assert_eq!(config.name_pattern, r"\.jpe?g$");
        assert_eq!(config.ignore_patterns, vec!["node_modules", "*.tmp"]);
        assert_eq!(config.queue_capacity, 0);
        assert_eq!(config.index_shards, 1);
        assert_eq!(config.timeout_secs, Some(30));
        assert!(config.follow_symlinks);
        assert!(!config.progress);
        assert!(config.validate().is_ok());
        assert!(config.walker_config().is_ok());
        Ok(())
    });
}

#[test]
fn test_env_overrides_file_and_cli_overrides_env() {
    Jail::expect_with(|jail| {
        jail.create_file("c.toml", "min_size = 10\nkeep = \"first-seen\"")?;
        jail.set_env("DUPSWEEP_MIN_SIZE", "20");

        let mut config = Config::load(Some(Path::new("c.toml"))).unwrap();
        assert_eq!(config.min_size, 20);
        assert_eq!(config.keep, KeepPolicy::FirstSeen);

        let cli = Cli::try_parse_from(["dupsweep", "/tmp", "--min-size", "30", "--keep", "lexicographic"])
            .unwrap();
        config.merge_cli(&cli);
        assert_eq!(config.min_size, 30);
        assert_eq!(config.keep, KeepPolicy::Lexicographic);
        Ok(())
    });
}

#[test]
fn test_config_invalid_toml() {
    Jail::expect_with(|jail| {
        jail.create_file("broken.toml", "threads = [")?;

        let result: Result<Config, _> = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("broken.toml"))
            .extract();
        assert!(result.is_err());

        let err = Config::load_from_path(Path::new("broken.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
        Ok(())
    });
}

#[test]
fn test_config_save_roundtrip_via_toml() {
    let config = Config {
        min_size: 512,
        algorithm: HashAlgorithm::Sha256,
        ..Config::default()
    };

    let content = toml::to_string_pretty(&config).unwrap();
    assert!(content.contains("min_size = 512"));
    assert!(content.contains("algorithm = \"sha256\""));
    assert!(!content.contains("threads"));
}
