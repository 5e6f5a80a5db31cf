//! Smoke tests for the waypost CLI
//!
//! These tests drive the built binary end to end against a site model.

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Get a command for the waypost binary with no ambient configuration
fn waypost() -> Command {
    let mut cmd = Command::cargo_bin("waypost").expect("waypost binary should exist");
    for var in [
        "WAYPOST_CONFIG",
        "WAYPOST_BASE_URL",
        "WAYPOST_EMAIL",
        "WAYPOST_PASSWORD",
        "WAYPOST_TIMEOUT_MS",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

const SITE: &str = r#"
base_url: http://localhost:3000
pages:
  /login:
    title: Sign in
    body_text: Sign in to continue
    elements:
      - id: email-field
        tag: input
        attributes: { id: email, type: email }
      - id: go
        tag: button
        text: Sign in
        attributes: { id: submit }
        behavior: { navigates_to: /dashboard }
  /dashboard:
    title: Dashboard
    body_text: Welcome back
"#;

const LOGIN: &str = r#"
name: login
steps:
  - name: open
    navigate: ${base_url}/login
  - name: email
    type_text:
      target: [{ id: email }]
      text: "${credentials.email}"
  - name: submit
    click: [{ id: submit }]
  - name: landed
    wait_for: { url_matches: /dashboard }
  - name: greeting
    assert: { text_contains: { substring: Welcome back } }
"#;

const BROKEN: &str = r"
name: broken
steps:
  - name: open
    navigate: ${nowhere}/login
";

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    waypost()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_help_flag() {
    waypost()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_no_args_shows_help() {
    waypost().assert().failure(); // Requires a subcommand
}

// ============================================================================
// Subcommand Help Tests
// ============================================================================

#[test]
fn test_run_subcommand_help() {
    waypost()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--site"))
        .stdout(predicate::str::contains("--jobs"));
}

#[test]
fn test_run_requires_scenarios() {
    waypost().arg("run").assert().failure();
}

// ============================================================================
// Config Command Tests
// ============================================================================

#[test]
fn test_config_json_redacts_password() {
    let dir = TempDir::new().unwrap();
    let config = write(
        &dir,
        "waypost.yaml",
        "base_url: https://staging.test\ncredentials:\n  email: qa@example.test\n  password: hunter2\n",
    );
    waypost()
        .args(["config", "--format", "json", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("https://staging.test"))
        .stdout(predicate::str::contains("qa@example.test"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_config_env_overrides_defaults() {
    waypost()
        .arg("config")
        .env("WAYPOST_BASE_URL", "https://from-env.test")
        .assert()
        .success()
        .stdout(predicate::str::contains("https://from-env.test"));
}

// ============================================================================
// Check Command Tests
// ============================================================================

#[test]
fn test_check_valid_scenario() {
    let dir = TempDir::new().unwrap();
    let login = write(&dir, "login.yaml", LOGIN);
    waypost()
        .arg("check")
        .arg(&login)
        .assert()
        .success()
        .stderr(predicate::str::contains("5 steps"));
}

#[test]
fn test_check_rejects_unknown_placeholder() {
    let dir = TempDir::new().unwrap();
    let login = write(&dir, "login.yaml", LOGIN);
    let broken = write(&dir, "broken.yaml", BROKEN);
    waypost()
        .arg("check")
        .arg(&login)
        .arg(&broken)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere"));
}

// ============================================================================
// Run Command Tests
// ============================================================================

#[test]
fn test_run_against_site_model() {
    let dir = TempDir::new().unwrap();
    let site = write(&dir, "site.yaml", SITE);
    let login = write(&dir, "login.yaml", LOGIN);
    let reports = dir.path().join("reports");

    waypost()
        .arg("run")
        .arg(&login)
        .arg("--site")
        .arg(&site)
        .arg("--output")
        .arg(&reports)
        .args(["--timeout-ms", "500", "--no-artifacts", "--color", "never"])
        .assert()
        .success()
        .stderr(predicate::str::contains("PASSED"));

    let written: Vec<_> = fs::read_dir(&reports).unwrap().collect();
    assert_eq!(written.len(), 1);
}

#[test]
fn test_run_failure_sets_exit_code() {
    let dir = TempDir::new().unwrap();
    let site = write(&dir, "site.yaml", SITE);
    let lost = write(
        &dir,
        "lost.yaml",
        "name: lost\nsteps:\n  - name: open\n    navigate: /missing\n",
    );

    waypost()
        .arg("run")
        .arg(&lost)
        .arg("--site")
        .arg(&site)
        .arg("--output")
        .arg(dir.path().join("reports"))
        .args(["--no-artifacts", "--color", "never"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FAILED"));
}

#[test]
fn test_run_without_site_reports_missing_backend() {
    let dir = TempDir::new().unwrap();
    let login = write(&dir, "login.yaml", LOGIN);
    waypost()
        .arg("run")
        .arg(&login)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No session backend"));
}
