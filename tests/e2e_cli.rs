//! CLI end-to-end tests
//!
//! Tests for the travelog command-line interface.

mod common;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

use common::{image_dimensions, png_bytes};

/// Get a command for the travelog binary
#[allow(deprecated)]
fn travelog_cmd() -> Command {
    Command::cargo_bin("travelog").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = travelog_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = travelog_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("travelog"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = travelog_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(concat!("travelog ", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = travelog_cmd();
    cmd.arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"))
        .stdout(predicate::str::contains("ffprobe"));
}

#[test]
fn test_cli_start_help() {
    let mut cmd = travelog_cmd();
    cmd.args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Start the upload server"));
}

#[test]
fn test_cli_start_invalid_port() {
    let mut cmd = travelog_cmd();
    cmd.args(["start", "--port", "99999"]).assert().failure();
}

#[test]
fn test_cli_validate_defaults() {
    let mut cmd = travelog_cmd();
    cmd.arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("using defaults"))
        .stdout(predicate::str::contains("0.0.0.0:3000"));
}

#[test]
fn test_cli_validate_config_file() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.json");
    fs::write(
        &config_file,
        r#"{ "server": { "port": 4100 }, "images": { "quality": 0 } }"#,
    )
    .unwrap();

    let mut cmd = travelog_cmd();
    cmd.args(["validate", config_file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains(":4100"))
        .stdout(predicate::str::contains("quality"));
}

#[test]
fn test_cli_validate_rejects_malformed_json() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.json");
    fs::write(&config_file, "{ not json").unwrap();

    let mut cmd = travelog_cmd();
    cmd.args(["validate", config_file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config parse error"));
}

#[test]
fn test_cli_process_nonexistent_file() {
    let temp = tempdir().unwrap();
    let mut cmd = travelog_cmd();
    cmd.args([
        "process",
        "/nonexistent/path/photo.jpg",
        "--output",
        temp.path().to_str().unwrap(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn test_cli_process_image_keeps_input() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("Lake View.png");
    fs::write(&input, png_bytes(1200, 600)).unwrap();
    let root = temp.path().join("uploads");

    let mut cmd = travelog_cmd();
    cmd.args([
        "process",
        input.to_str().unwrap(),
        "--kind",
        "image",
        "--output",
        root.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("Lake View.webp"));

    assert!(input.exists());
    assert_eq!(image_dimensions(&root.join("images/Lake View.webp")), (800, 400));
}

#[test]
fn test_cli_process_avatar() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("me.png");
    fs::write(&input, png_bytes(60, 90)).unwrap();
    let root = temp.path().join("uploads");

    let mut cmd = travelog_cmd();
    cmd.args([
        "process",
        input.to_str().unwrap(),
        "--kind",
        "avatar",
        "--output",
        root.to_str().unwrap(),
    ])
    .assert()
    .success();

    assert_eq!(image_dimensions(&root.join("avatars/me.webp")), (200, 200));
}

#[test]
fn test_cli_process_rejects_unknown_type() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("notes.txt");
    fs::write(&input, "hello").unwrap();

    let mut cmd = travelog_cmd();
    cmd.args([
        "process",
        input.to_str().unwrap(),
        "--output",
        temp.path().join("uploads").to_str().unwrap(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Unsupported media type"));
}
