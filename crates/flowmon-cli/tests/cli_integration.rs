//! Integration tests for flowmon-cli
//!
//! These tests verify the CLI commands work end-to-end against a
//! throwaway database. Tests run serially to avoid database lock
//! conflicts.

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

/// Get a Command for the flowmon binary pointed at a throwaway database
fn flowmon(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("flowmon").unwrap();
    cmd.env(
        "FLOWMON_DB_PATH",
        dir.path().join("flowmon.db").to_string_lossy().to_string(),
    );
    cmd
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
#[serial]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    flowmon(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("flowmon"))
        .stdout(predicate::str::contains("COMMAND").or(predicate::str::contains("Commands")));
}

#[test]
#[serial]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    flowmon(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("flowmon"));
}

#[test]
#[serial]
fn test_account_help() {
    let dir = TempDir::new().unwrap();
    flowmon(&dir)
        .args(["account", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("account"));
}

#[test]
#[serial]
fn test_poll_help() {
    let dir = TempDir::new().unwrap();
    flowmon(&dir)
        .args(["poll", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("concurrency"));
}

// =============================================================================
// Account Command Tests
// =============================================================================

#[test]
#[serial]
fn test_account_add_and_list() {
    let dir = TempDir::new().unwrap();

    flowmon(&dir)
        .args([
            "account", "add", "13812345678", "--app-id", "app-1", "--token", "secret",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("13812345678"));

    flowmon(&dir)
        .args(["account", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("13812345678"))
        .stdout(predicate::str::contains("full"));
}

#[test]
#[serial]
fn test_account_add_cookie_only() {
    let dir = TempDir::new().unwrap();

    flowmon(&dir)
        .args([
            "account",
            "add-cookie",
            "13900001111",
            "--cookie",
            "JSESSIONID=abc",
        ])
        .assert()
        .success();

    flowmon(&dir)
        .args(["account", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cookie_only"))
        .stdout(predicate::str::contains("cached"));
}

#[test]
#[serial]
fn test_account_list_json() {
    let dir = TempDir::new().unwrap();

    flowmon(&dir)
        .args([
            "account", "add", "13812345678", "--app-id", "app-1", "--token", "secret",
        ])
        .assert()
        .success();

    flowmon(&dir)
        .args(["account", "list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"account\": \"13812345678\""));
}

#[test]
#[serial]
fn test_account_remove() {
    let dir = TempDir::new().unwrap();

    flowmon(&dir)
        .args([
            "account", "add", "13812345678", "--app-id", "app-1", "--token", "secret",
        ])
        .assert()
        .success();

    flowmon(&dir)
        .args(["account", "remove", "13812345678"])
        .assert()
        .success();

    flowmon(&dir)
        .args(["account", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("13812345678").not());
}

#[test]
#[serial]
fn test_account_remove_missing_fails() {
    let dir = TempDir::new().unwrap();
    flowmon(&dir)
        .args(["account", "remove", "10000000000"])
        .assert()
        .failure();
}

#[test]
#[serial]
fn test_account_set_cookie_requires_existing_account() {
    let dir = TempDir::new().unwrap();
    flowmon(&dir)
        .args(["account", "set-cookie", "10000000000", "--cookie", "c=1"])
        .assert()
        .failure();
}

// =============================================================================
// Snapshot Command Tests
// =============================================================================

#[test]
#[serial]
fn test_latest_empty() {
    let dir = TempDir::new().unwrap();
    flowmon(&dir)
        .args(["latest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No snapshots recorded"));
}

#[test]
#[serial]
fn test_history_empty() {
    let dir = TempDir::new().unwrap();
    flowmon(&dir)
        .args(["history", "13812345678", "--days", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No snapshots in this window"));
}

#[test]
#[serial]
fn test_prune_with_no_accounts() {
    let dir = TempDir::new().unwrap();
    flowmon(&dir)
        .args(["prune"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pruned 0"));
}

#[test]
#[serial]
fn test_poll_with_no_accounts() {
    let dir = TempDir::new().unwrap();
    flowmon(&dir)
        .args(["poll"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No accounts registered"));
}
