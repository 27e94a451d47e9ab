use std::process::Command;

use clap::Parser;
use dupsweep::cli::Cli;
use dupsweep::error::ExitCode;
use dupsweep::run_app;
use figment::Jail;

use super::common::create_tree;
use tempfile::tempdir;

fn cli(args: &[&str]) -> Cli {
    let mut full = vec!["dupsweep", "-q", "--no-progress"];
    full.extend_from_slice(args);
    Cli::try_parse_from(full).unwrap()
}

#[test]
fn test_run_app_success_with_duplicates() {
    let dir = create_tree(&[("a.txt", b"hello"), ("b.txt", b"hello"), ("c.txt", b"world")]);
    let root = dir.path().to_string_lossy().into_owned();

    Jail::expect_with(|_jail| {
        let code = run_app(cli(&[root.as_str()])).unwrap();
        assert_eq!(code, ExitCode::Success);
        Ok(())
    });
}

#[test]
fn test_run_app_success_without_duplicates() {
    let dir = create_tree(&[("a", b"1"), ("b", b"2")]);
    let root = dir.path().to_string_lossy().into_owned();

    Jail::expect_with(|_jail| {
        let code = run_app(cli(&[root.as_str(), "-o", "json", "--single-thread"])).unwrap();
        assert_eq!(code, ExitCode::Success);
        Ok(())
    });
}

#[test]
fn test_run_app_missing_root_is_invalid_input() {
    Jail::expect_with(|_jail| {
        let err = run_app(cli(&["/nonexistent/dupsweep/root"])).unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::InvalidInput);
        Ok(())
    });
}

#[test]
fn test_binary_missing_root_writes_nothing_to_stdout() {
    let home = tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_dupsweep"))
        .arg("/nonexistent/dupsweep/root")
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(ExitCode::InvalidInput.as_i32()));
    assert!(output.stdout.is_empty(), "stdout: {}", String::from_utf8_lossy(&output.stdout));
    assert!(String::from_utf8_lossy(&output.stderr).contains("/nonexistent/dupsweep/root"));
}

#[test]
fn test_run_app_invalid_pattern_is_invalid_input() {
    let dir = create_tree(&[("a", b"1")]);
    let root = dir.path().to_string_lossy().into_owned();

    Jail::expect_with(|_jail| {
        let err = run_app(cli(&[root.as_str(), "--name", "(unclosed"])).unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::InvalidInput);
        Ok(())
    });
}

#[test]
fn test_run_app_invalid_config_is_invalid_input() {
    let dir = create_tree(&[("a", b"1")]);
    let root = dir.path().to_string_lossy().into_owned();

    Jail::expect_with(|jail| {
        jail.create_file("bad.toml", "index_shards = 0")?;
        let err = run_app(cli(&[root.as_str(), "--config", "bad.toml"])).unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::InvalidInput);

        let err = run_app(cli(&[root.as_str(), "--config", "missing.toml"])).unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::InvalidInput);
        Ok(())
    });
}

#[test]
fn test_run_app_delete_removes_redundant_copies() {
    let dir = create_tree(&[("keep.bin", b"payload"), ("zcopy.bin", b"payload")]);
    let root = dir.path().to_string_lossy().into_owned();

    Jail::expect_with(|_jail| {
        let code = run_app(cli(&[root.as_str(), "--delete", "--permanent"])).unwrap();
        assert_eq!(code, ExitCode::Success);
        Ok(())
    });

    assert!(dir.path().join("keep.bin").exists());
    assert!(!dir.path().join("zcopy.bin").exists());
}
