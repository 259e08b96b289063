#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::indexing_slicing)]
//! `POST /reload`: the HTTP-triggered full reload, gated by
//! `--web.enable-reload`, and its DSN-preservation contract.

use anyhow::Result;
use std::io::Write;

mod common;

const V1: &str = r"
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

// Same target identity, different help text - exercises the reload path
// without changing the scrape mode.
const V2: &str = r"
target:
  data_source_name: 'sqlite::memory:'
  collectors: [basic]
collectors:
  - collector_name: basic
    metrics:
      - metric_name: answer
        type: gauge
        help: the answer, reloaded
        values: [v]
        query: SELECT 42 AS v
";

const V3_JOBS: &str = r"
jobs:
  - job_name: j
    collectors: [basic]
    static_configs:
      - targets:
          t1: 'sqlite::memory:'
collectors:
  - collector_name: basic
    metrics:
      - metric_name: answer
        type: gauge
        help: the answer
        values: [v]
        query: SELECT 42 AS v
";

fn write_config(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("sql_exporter.yml");
    let mut f = std::fs::File::create(&path).expect("create config file");
    f.write_all(contents.as_bytes()).expect("write config file");
    path
}

#[tokio::test]
async fn reload_picks_up_edited_collector_help_text() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_config(&dir, V1);

    let (exp, addr, handle) = common::spawn_server_from_file(V1, path.clone()).await?;

    let before = reqwest::get(format!("{}/metrics", common::base_url(addr))).await?.text().await?;
    assert!(before.contains("# HELP answer the answer\n"));

    write_config(&dir, V2);
    let response = reqwest::Client::new()
        .post(format!("{}/reload", common::base_url(addr)))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    let after = reqwest::get(format!("{}/metrics", common::base_url(addr))).await?.text().await?;
    assert!(after.contains("# HELP answer the answer, reloaded\n"));

    drop(exp);
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn reload_is_forbidden_when_not_enabled() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_config(&dir, V1);

    let (exp, addr, handle) = common::spawn_server_with_reload(V1, path, false).await?;

    let response = reqwest::Client::new()
        .post(format!("{}/reload", common::base_url(addr)))
        .send()
        .await?;
    assert_eq!(response.status(), 403);

    drop(exp);
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn reload_refuses_a_scrape_mode_change() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_config(&dir, V1);

    let (exp, addr, handle) = common::spawn_server_from_file(V1, path.clone()).await?;

    write_config(&dir, V3_JOBS);
    let response = reqwest::Client::new()
        .post(format!("{}/reload", common::base_url(addr)))
        .send()
        .await?;
    assert_eq!(response.status(), 500);

    // The old single-target config must still be live.
    let body = reqwest::get(format!("{}/metrics", common::base_url(addr))).await?.text().await?;
    assert!(body.contains("answer 42"));

    drop(exp);
    handle.abort();
    Ok(())
}
