#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::indexing_slicing)]
//! `/healthz` and the `/` landing page.

use anyhow::Result;

mod common;

const MINIMAL: &str = r"
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
async fn healthz_returns_ok_regardless_of_target_state() -> Result<()> {
    let (_exp, addr, handle) = common::spawn_server(MINIMAL).await?;

    let response = reqwest::get(format!("{}/healthz", common::base_url(addr))).await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "OK\n");

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn landing_page_links_to_the_other_routes() -> Result<()> {
    let (_exp, addr, handle) = common::spawn_server(MINIMAL).await?;

    let response = reqwest::get(common::base_url(addr)).await?;
    assert_eq!(response.status(), 200);

    let body = response.text().await?;
    assert!(body.contains("/metrics"));
    assert!(body.contains("/sql_exporter_metrics"));
    assert!(body.contains("/config"));
    assert!(body.contains("/healthz"));

    handle.abort();
    Ok(())
}
