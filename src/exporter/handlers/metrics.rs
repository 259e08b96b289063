//! `GET /metrics` (the scrape endpoint proper) and `GET /sql_exporter_metrics`
//! (self-monitoring): thin `axum` handlers reading from shared `State`.

use crate::exporter::Exporter;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use prometheus::Encoder;
use std::sync::Arc;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const TIMEOUT_HEADER: &str = "x-prometheus-scrape-timeout-seconds";

pub async fn handler(
    State(exporter): State<Arc<Exporter>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> impl IntoResponse {
    let jobs = parse_jobs(query.as_deref());
    let header_seconds = headers
        .get(TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok());
    let timeout = exporter.effective_timeout(header_seconds).await;

    let result = exporter.gather(jobs.as_deref(), timeout).await;
    if result.sample_count == 0 {
        let message = result
            .first_error
            .unwrap_or_else(|| "no targets configured".to_string());
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("No metrics gathered, {message}\n"),
        )
            .into_response();
    }

    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], result.text).into_response()
}

pub async fn internal_handler(State(exporter): State<Arc<Exporter>>) -> impl IntoResponse {
    exporter.refresh_internal_metrics();

    let families = exporter.registry().gather();
    let encoder = prometheus::TextEncoder::new();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to encode internal metrics\n".to_string(),
        )
            .into_response();
    }

    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], buf).into_response()
}

/// Parses every `jobs=` entry off the raw query string, returning `None`
/// when there isn't one (meaning: scrape every target).
fn parse_jobs(raw_query: Option<&str>) -> Option<Vec<String>> {
    let raw_query = raw_query?;
    let jobs: Vec<String> = url::form_urlencoded::parse(raw_query.as_bytes())
        .filter(|(k, _)| k == "jobs" || k == "jobs[]")
        .map(|(_, v)| v.into_owned())
        .collect();
    if jobs.is_empty() {
        None
    } else {
        Some(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_jobs_param_scrapes_everything() {
        assert_eq!(parse_jobs(None), None);
        assert_eq!(parse_jobs(Some("")), None);
    }

    #[test]
    fn jobs_param_is_collected_into_a_filter() {
        let jobs = parse_jobs(Some("jobs=a&jobs=b")).unwrap();
        assert_eq!(jobs, vec!["a".to_string(), "b".to_string()]);
    }
}
