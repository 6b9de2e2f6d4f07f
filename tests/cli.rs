//! CLI integration tests
//!
//! Every run uses `--dry-run` so no MongoDB server is needed.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use regex::Regex;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn idxprof() -> Command {
    let mut cmd = Command::cargo_bin("idxprof").unwrap();
    cmd.env_remove("MONGO_URI")
        .env_remove("MONGO_DB")
        .env_remove("PROFILER_TIMEOUT_MS")
        .env_remove("WORKLOAD_FILE")
        .env_remove("ENABLE_COLOR");
    cmd
}

#[test]
fn test_help_lists_options() {
    idxprof()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--timeout-ms"))
        .stdout(predicate::str::contains("--workload"));
}

#[test]
fn test_dry_run_prints_table() {
    let output = idxprof()
        .args(["--dry-run", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Index Performance Report"))
        .stdout(predicate::str::contains("Courses by Category"))
        .stdout(predicate::str::contains("Assignments Due Soon"))
        .get_output()
        .stdout
        .clone();

    let text = String::from_utf8(output).unwrap();
    assert!(!text.contains('\u{1b}'), "no ANSI escapes with --no-color");
    let percent = Regex::new(r"-?\d+\.\d%").unwrap();
    assert!(percent.is_match(&text));
    assert!(text.contains("got slower after indexing"));
}

#[test]
fn test_dry_run_json_is_parseable() {
    let output = idxprof()
        .args(["--dry-run", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let rows = value["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["label"], "Courses by Category");
    assert_eq!(value["interrupted"], false);
    assert_eq!(value["completed_stages"].as_array().unwrap().len(), 5);
}

#[test]
fn test_markdown_output_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("summary.md");

    idxprof()
        .args(["--dry-run", "--no-color", "-o"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Markdown report written to"));

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# Indexing & Query Performance Summary"));
    assert!(text.contains("| Enrollments by User | enrollments |"));
}

#[test]
fn test_custom_workload_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("workload.json");
    fs::write(
        &path,
        r#"{
            "indexes": [{ "collection": "users", "fields": [{ "field": "email" }], "unique": true }],
            "queries": [{ "label": "User by Email", "collection": "users",
                          "type": "find", "filter": { "email": "a@example.com" } }]
        }"#,
    )
    .unwrap();

    idxprof()
        .args(["--dry-run", "--no-color", "--workload"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("User by Email"))
        .stdout(predicate::str::contains("Courses by Category").not());
}

#[test]
fn test_invalid_workload_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("workload.json");
    fs::write(&path, r#"{ "indexes": [], "queries": [] }"#).unwrap();

    idxprof()
        .args(["--dry-run", "--no-color", "--workload"])
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Workload help"));
}

#[test]
fn test_zero_timeout_rejected() {
    idxprof()
        .args(["--dry-run", "--timeout-ms", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("timeout"));
}

#[test]
fn test_conflicting_color_flags() {
    idxprof()
        .args(["--dry-run", "--color", "--no-color"])
        .assert()
        .code(1);
}

#[test]
fn test_env_help_prints_variables_and_example() {
    idxprof()
        .arg("--env-help")
        .assert()
        .success()
        .stdout(predicate::str::contains("PROFILER_TIMEOUT_MS"))
        .stdout(predicate::str::contains("Example .env file"))
        .stdout(predicate::str::contains("Index Performance Report").not());
}

#[test]
fn test_init_env_writes_example_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".env");

    idxprof()
        .arg("--init-env")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote example configuration"));
    assert!(fs::read_to_string(&path).unwrap().contains("# MONGO_URI="));

    idxprof().arg("--init-env").arg(&path).assert().code(1);
}
