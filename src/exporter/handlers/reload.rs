//! `POST /reload`: triggers the same full reload procedure SIGHUP does,
//! gated by `--web.enable-reload`.

use crate::exporter::Exporter;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::sync::Arc;

pub async fn handler(State(exporter): State<Arc<Exporter>>) -> impl IntoResponse {
    if !exporter.web_enable_reload() {
        return (
            StatusCode::FORBIDDEN,
            "reloading via HTTP is disabled, pass --web.enable-reload to allow it\n".to_string(),
        );
    }

    match exporter.reload().await {
        Ok(()) => (StatusCode::OK, "reloaded\n".to_string()),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, format!("reload failed: {err}\n")),
    }
}
