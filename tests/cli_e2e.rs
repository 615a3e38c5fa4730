//! End-to-end CLI tests for the cqww-downloader binary.

// `Command::cargo_bin` is deprecated in assert_cmd >=2.0.17 in favor of
// `cargo::cargo_bin_cmd!` macro. Suppressed until migration to the new API.
#![allow(deprecated)]

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Command with an isolated, empty config home.
fn command(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cqww-downloader").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(config_home: &Path, contents: &str) {
    let config_dir = config_home.join("cqww-downloader");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), contents).unwrap();
}

async fn archive_with_station_log(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/publiclogs/2023cw/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="ok1k.log">ok1k.log</a> <a href="OK1K_2.log">OK1K_2.log</a>"#,
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/publiclogs/2023cw/ok1k.log"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'Q'; 45_000]))
        .mount(server)
        .await;
}

#[test]
fn test_binary_help_displays_usage() {
    let temp = TempDir::new().unwrap();
    command(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--call"))
        .stdout(predicate::str::contains("--overwrite"));
}

#[test]
fn test_binary_version_displays_version() {
    let temp = TempDir::new().unwrap();
    command(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let temp = TempDir::new().unwrap();
    command(temp.path())
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_rejects_bad_year_before_any_work() {
    let temp = TempDir::new().unwrap();
    command(temp.path())
        .args(["--call", "OK1K", "--year", "23"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid year"));
}

#[test]
fn test_binary_rejects_non_http_url() {
    let temp = TempDir::new().unwrap();
    command(temp.path())
        .args(["--url", "file:///etc/passwd"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("only http and https"));
}

#[test]
fn test_binary_rejects_invalid_config_file() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), "max_concurrent = 0\n");
    let out = temp.path().join("out");

    command(temp.path())
        .arg("-o")
        .arg(&out)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("max_concurrent"));
    assert!(!out.exists(), "no work may start with a bad config");
}

#[test]
fn test_binary_rejects_output_path_that_is_a_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("occupied");
    std::fs::write(&file, b"x").unwrap();

    command(temp.path())
        .arg("-o")
        .arg(&file)
        .args(["--index-url", "http://127.0.0.1:9/publiclogs/"])
        .args(["--url", "http://127.0.0.1:9/publiclogs/2024ph/"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not a directory"));
}

#[tokio::test]
async fn test_binary_exact_download_prints_json_summary() {
    let server = MockServer::start().await;
    archive_with_station_log(&server).await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("logs");

    command(temp.path())
        .arg("-o")
        .arg(&out)
        .args(["--index-url", &format!("{}/publiclogs/", server.uri())])
        .args(["--call", "ok1k", "--year", "2023", "--mode", "CW", "--json", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""ok":1"#))
        .stdout(predicate::str::contains(r#""total_bytes":45000"#));

    assert_eq!(
        std::fs::metadata(out.join("2023_CW_OK1K.log")).unwrap().len(),
        45_000
    );
}

#[tokio::test]
async fn test_binary_skip_policy_from_config_file() {
    let server = MockServer::start().await;
    archive_with_station_log(&server).await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("logs");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("2023_CW_OK1K.log"), b"kept").unwrap();
    write_config(temp.path(), "overwrite = \"skip\"\n");

    command(temp.path())
        .arg("-o")
        .arg(&out)
        .args(["--index-url", &format!("{}/publiclogs/", server.uri())])
        .args(["--call", "OK1K", "--year", "2023", "--mode", "cw", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""skipped":1"#));

    assert_eq!(std::fs::read(out.join("2023_CW_OK1K.log")).unwrap(), b"kept");
}

#[tokio::test]
async fn test_binary_exit_code_two_on_partial_failure() {
    let server = MockServer::start().await;
    archive_with_station_log(&server).await;
    // The SSB listing for 2023 is missing, so one of the two pairs fails.
    let temp = TempDir::new().unwrap();

    command(temp.path())
        .arg("-o")
        .arg(temp.path().join("logs"))
        .args(["--index-url", &format!("{}/publiclogs/", server.uri())])
        .args(["--call", "OK1K", "--year", "2023", "-q"])
        .assert()
        .code(2);
}
