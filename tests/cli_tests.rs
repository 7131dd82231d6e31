#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

fn scamwatch() -> Command {
    let mut cmd = Command::cargo_bin("scamwatch").unwrap();
    cmd.env_remove("TELEGRAM_BOT_TOKEN")
        .env_remove("SCAMWATCH_COMPLETION_TOKEN")
        .env_remove("SCAMWATCH_COMPLETION_URL")
        .env_remove("SCAMWATCH_DATA_DIR")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_version_command() {
    scamwatch()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "scamwatch {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_flags() {
    for flag in ["--version", "-V"] {
        scamwatch()
            .arg(flag)
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }
}

#[test]
fn test_no_args_prints_help() {
    scamwatch()
        .assert()
        .success()
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_unknown_command_fails() {
    scamwatch()
        .arg("frobnicate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("frobnicate"));
}

#[test]
fn test_verbose_logs_to_stderr_only() {
    scamwatch()
        .args(["-v", "version"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DEBUG").not())
        .stderr(predicate::str::contains("DEBUG"));

    scamwatch()
        .arg("version")
        .assert()
        .success()
        .stderr(predicate::str::contains("DEBUG").not());
}

#[test]
fn test_activity_on_empty_store() {
    let dir = TempDir::new().unwrap();
    scamwatch()
        .env("SCAMWATCH_DATA_DIR", dir.path().join("data"))
        .args(["activity", "--config"])
        .arg(dir.path().join("missing.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No activity recorded."));
}

#[test]
fn test_run_without_completion_token_fails() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, r#"{"data_dir": "DATA"}"#.replace("DATA", &dir.path().join("data").to_string_lossy())).unwrap();
    fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600)).unwrap();

    scamwatch()
        .args(["run", "--config"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("completion"));
}

#[test]
fn test_run_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, r#"{"history": {"max_entries_per_user": 0}}"#).unwrap();
    fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600)).unwrap();

    scamwatch()
        .args(["run", "--config"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_entries_per_user"));
}
