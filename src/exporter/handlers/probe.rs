//! `GET /probe?target=<dsn>&collectors=<csv>`: runs one disposable scrape
//! against an ad hoc target, outside the configured job/target list.

use crate::exporter::Exporter;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use std::sync::Arc;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const TIMEOUT_HEADER: &str = "x-prometheus-scrape-timeout-seconds";

pub async fn handler(
    State(exporter): State<Arc<Exporter>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> impl IntoResponse {
    let params: std::collections::HashMap<String, String> = query
        .as_deref()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let Some(dsn) = params.get("target").filter(|d| !d.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing required query parameter: target\n".to_string())
            .into_response();
    };

    let collectors: Option<Vec<String>> = params.get("collectors").map(|csv| {
        csv.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    });

    let header_seconds = headers
        .get(TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok());
    let timeout = exporter.effective_timeout(header_seconds).await;

    match exporter.probe(dsn, collectors.as_deref(), timeout).await {
        Ok(result) if result.sample_count > 0 => {
            (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], result.text).into_response()
        }
        Ok(result) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "No metrics gathered, {}\n",
                result.first_error.unwrap_or_else(|| "no collectors ran".to_string())
            ),
        )
            .into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, format!("probe failed: {err}\n")).into_response(),
    }
}
