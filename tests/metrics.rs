#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::indexing_slicing)]
//! `/metrics` content type, rendering and `jobs[]` filtering.

use anyhow::Result;

mod common;

const SINGLE_TARGET: &str = r"
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

#[tokio::test]
async fn metrics_endpoint_reports_prometheus_text_content_type() -> Result<()> {
    let (_exp, addr, handle) = common::spawn_server(SINGLE_TARGET).await?;

    let response = reqwest::get(format!("{}/metrics", common::base_url(addr))).await?;
    assert_eq!(response.status(), 200);

    let content_type = response.headers().get("content-type").expect("content-type header present");
    assert_eq!(content_type, "text/plain; version=0.0.4; charset=utf-8");

    let body = response.text().await?;
    assert!(body.contains("# HELP answer"));
    assert!(body.contains("# TYPE answer gauge"));

    handle.abort();
    Ok(())
}

const TWO_JOBS: &str = r"
jobs:
  - job_name: alpha
    collectors: [basic]
    static_configs:
      - targets:
          a1: 'sqlite::memory:'
  - job_name: beta
    collectors: [basic]
    static_configs:
      - targets:
          b1: 'sqlite::memory:'
collectors:
  - collector_name: basic
    metrics:
      - metric_name: answer
        type: gauge
        help: the answer
        values: [v]
        query: SELECT 42 AS v
";

#[tokio::test]
async fn jobs_filter_restricts_the_scrape_to_matching_job_names() -> Result<()> {
    let (_exp, addr, handle) = common::spawn_server(TWO_JOBS).await?;

    let body = reqwest::get(format!("{}/metrics?jobs[]=alpha", common::base_url(addr)))
        .await?
        .text()
        .await?;
    assert!(body.contains(r#"job="alpha""#));
    assert!(!body.contains(r#"job="beta""#));

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn no_jobs_filter_scrapes_every_job() -> Result<()> {
    let (_exp, addr, handle) = common::spawn_server(TWO_JOBS).await?;

    let body = reqwest::get(format!("{}/metrics", common::base_url(addr))).await?.text().await?;
    assert!(body.contains(r#"job="alpha""#));
    assert!(body.contains(r#"job="beta""#));

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn internal_metrics_endpoint_is_distinct_from_the_scrape_endpoint() -> Result<()> {
    let (_exp, addr, handle) = common::spawn_server(SINGLE_TARGET).await?;

    let body = reqwest::get(format!("{}/sql_exporter_metrics", common::base_url(addr)))
        .await?
        .text()
        .await?;
    assert!(body.contains("# HELP"));
    assert!(!body.contains("# HELP answer "));

    handle.abort();
    Ok(())
}
