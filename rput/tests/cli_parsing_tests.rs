//! CLI Argument Parsing Tests for rput
//!
//! These tests verify that command-line arguments are parsed correctly and maintain
//! backward compatibility. The focus is on argument values, aliases, and formats.

use assert_cmd::Command;

#[test]
fn test_help_runs() {
    Command::cargo_bin("rput")
        .unwrap()
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn test_version_runs() {
    Command::cargo_bin("rput")
        .unwrap()
        .arg("--version")
        .assert()
        .success();
}

// ============================================================================
// Protocol Argument Parsing Tests
// ============================================================================

#[test]
fn test_protocol_ftps() {
    Command::cargo_bin("rput")
        .unwrap()
        .args(["--protocol", "ftps", "--help"])
        .assert()
        .success();
}

#[test]
fn test_protocol_invalid_value() {
    Command::cargo_bin("rput")
        .unwrap()
        .args(["--protocol", "scp", "--help"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid value 'scp'"));
}

// ============================================================================
// Flag Tests
// ============================================================================

#[test]
fn test_update_flag() {
    Command::cargo_bin("rput")
        .unwrap()
        .args(["--update", "--help"])
        .assert()
        .success();
}

#[test]
fn test_update_short_flag() {
    Command::cargo_bin("rput")
        .unwrap()
        .args(["-u", "--help"])
        .assert()
        .success();
}

#[test]
fn test_password_env_value() {
    Command::cargo_bin("rput")
        .unwrap()
        .args(["--password-env", "UPLOAD_SECRET", "--help"])
        .assert()
        .success();
}

#[test]
fn test_missing_remote_fails() {
    Command::cargo_bin("rput")
        .unwrap()
        .arg("report.csv")
        .assert()
        .failure()
        .stderr(predicates::str::contains("required"));
}

#[test]
fn test_missing_local_fails() {
    Command::cargo_bin("rput")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicates::str::contains("required"));
}
