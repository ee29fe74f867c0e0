//! CLI integration tests for the `scl` binary.
//!
//! Uses `assert_cmd` to spawn the binary and verify exit codes and
//! output for valid, invalid and missing inputs.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn scl() -> Command {
    Command::cargo_bin("scl").expect("scl binary builds")
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write fixture");
    path
}

#[test]
fn help_exits_0_with_description() {
    scl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SCL validation toolchain"));
}

#[test]
fn check_valid_file_exits_0_with_no_output() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "valid.scl", "SET ACTION VALIDATE . \n");
    scl()
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn check_invalid_file_exits_1_and_reports_position() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "invalid.scl", " SET ACTION INVALID . \n");
    scl()
        .arg("check")
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains(":1:13: error: Invalid word"))
        .stdout(predicate::str::contains("Possible valid values: ADD, ARCHIVE"));
}

#[test]
fn check_warning_only_file_exits_0() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "warn.scl", "SET ACTiON ADD . \n");
    scl()
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("warning: Keyword should be uppercased"));
}

#[test]
fn check_json_output_is_machine_readable() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "invalid.scl", "ADD ELEMENT el FROM DSNAME dsn .\n");
    let output = scl()
        .arg("--output")
        .arg("json")
        .arg("check")
        .arg(&path)
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();
    let parsed: serde_json::Value =
        serde_json::from_slice(&output).expect("stdout parses as JSON");
    let diagnostics = parsed[0]["diagnostics"].as_array().expect("array");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0]["message"],
        "TO clause incomplete in the current SCL"
    );
}

#[test]
fn check_missing_file_exits_2() {
    scl()
        .arg("check")
        .arg("definitely-not-here.scl")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("definitely-not-here.scl"));
}
