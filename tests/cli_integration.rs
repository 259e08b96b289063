#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::indexing_slicing)]
//! Subprocess tests for the `sql_exporter` binary: flag parsing, startup
//! failure modes, and the HTTP surface reached through a real process.
//!
//! Builds the binary once via `OnceLock` and reuses it across tests.

use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::Duration;

mod common;

static BINARY_PATH: OnceLock<PathBuf> = OnceLock::new();

fn get_binary_path() -> &'static PathBuf {
    BINARY_PATH.get_or_init(|| {
        let output = Command::new("cargo")
            .args(["build", "--bin", "sql_exporter"])
            .output()
            .expect("failed to build binary");

        assert!(
            output.status.success(),
            "failed to build binary:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );

        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("target")
            .join("debug")
            .join("sql_exporter")
    })
}

fn run_with_args(args: &[&str]) -> std::io::Result<std::process::Output> {
    Command::new(get_binary_path()).args(args).output()
}

struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sql_exporter.yml");
    let mut f = std::fs::File::create(&path).expect("create config file");
    f.write_all(contents.as_bytes()).expect("write config file");
    (dir, path)
}

const MINIMAL_CONFIG: &str = r"
target:
  data_source_name: 'sqlite::memory:'
  collectors: [basic]
collectors:
  - collector_name: basic
    metrics:
      - metric_name: answer
        type: gauge
        help: the answer
        values: [v]
        query: SELECT 42 AS v
";

#[test]
fn help_flag_describes_the_exporter_and_its_flags() {
    let output = run_with_args(&["--help"]).expect("execute binary");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("SQL metric exporter") || stdout.contains("exporter"));
    assert!(stdout.contains("--web.listen-address"));
    assert!(stdout.contains("--config.file"));
    assert!(stdout.contains("--web.enable-reload"));
}

#[test]
fn version_flag_prints_the_crate_name() {
    let output = run_with_args(&["--version"]).expect("execute binary");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sql_exporter"));
}

#[test]
fn missing_config_file_exits_with_an_error() {
    let output = run_with_args(&["--config.file", "/nonexistent/sql_exporter.yml"]).expect("execute binary");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sql_exporter.yml") || stderr.contains("loading configuration"));
}

#[tokio::test]
async fn starts_up_and_serves_healthz_from_a_real_config_file() -> Result<()> {
    let (_dir, config_path) = write_config(MINIMAL_CONFIG);
    let port = common::get_available_port();

    let child = Command::new(get_binary_path())
        .args([
            "--config.file",
            config_path.to_str().expect("utf8 path"),
            "--web.listen-address",
            &format!(":{port}"),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn sql_exporter");
    let mut guard = ChildGuard(child);

    assert!(common::wait_for_server(port, 100).await, "server failed to start");

    let body = reqwest::get(format!("http://127.0.0.1:{port}/healthz")).await?.text().await?;
    assert_eq!(body, "OK\n");

    let metrics = reqwest::get(format!("http://127.0.0.1:{port}/metrics")).await?.text().await?;
    assert!(metrics.contains("answer 42"));

    let _ = guard.0.kill();
    let _ = guard.0.wait();
    Ok(())
}
