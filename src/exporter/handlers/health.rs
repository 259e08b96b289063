//! `GET /healthz` and the `/` landing page. Liveness here doesn't depend on
//! any one target being reachable.

use axum::response::{Html, IntoResponse};
use axum::http::StatusCode;

pub async fn handler() -> impl IntoResponse {
    (StatusCode::OK, "OK\n")
}

pub async fn landing_page() -> impl IntoResponse {
    let version = crate::cli::built_info::PKG_VERSION;
    let hash = crate::cli::GIT_COMMIT_HASH;
    Html(format!(
        "<html><head><title>SQL Exporter</title></head><body>\
<h1>SQL Exporter</h1>\
<p>Version {version} ({hash})</p>\
<ul>\
<li><a href=\"/metrics\">Metrics</a></li>\
<li><a href=\"/sql_exporter_metrics\">Internal metrics</a></li>\
<li><a href=\"/config\">Configuration</a></li>\
<li><a href=\"/healthz\">Health</a></li>\
</ul>\
</body></html>"
    ))
}
