//! `GET /config`: a YAML view of the live resolved configuration, with
//! every DSN redacted.

use crate::exporter::Exporter;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::sync::Arc;

pub async fn handler(State(exporter): State<Arc<Exporter>>) -> impl IntoResponse {
    match exporter.config_yaml().await {
        Ok(yaml) => (StatusCode::OK, yaml).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to render configuration: {err}\n"),
        )
            .into_response(),
    }
}
