#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::indexing_slicing)]
#![allow(dead_code)]

use anyhow::Result;
use sql_exporter::config::Config;
use sql_exporter::db::HandleReuseMap;
use sql_exporter::exporter::{self, Exporter};
use sql_exporter::reload;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::task::JoinHandle;

static INSTALL_DRIVERS: Once = Once::new();

fn ensure_drivers_installed() {
    INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);
}

/// Find an available port for testing by binding to port 0 and reading it back.
pub fn get_available_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("failed to bind to a random port");
    listener.local_addr().expect("failed to read local addr").port()
}

/// Poll `localhost:<port>` until a TCP connection succeeds or `max_attempts` elapses.
pub async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    for _ in 0..max_attempts {
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

/// Builds an [`Exporter`] from an inline YAML document (single-target or
/// jobs mode) and serves it on an ephemeral loopback port. The config is
/// resolved from the string directly - no reload is possible against a
/// server built this way, since there is no backing file (see
/// [`spawn_server_from_file`] for that).
pub async fn spawn_server(yaml: &str) -> Result<(Arc<Exporter>, SocketAddr, JoinHandle<()>)> {
    spawn_server_from_file(yaml, PathBuf::from("<inline-test-config>")).await
}

/// Like [`spawn_server`], but backs the exporter with a real file path so
/// `/reload` and `SIGHUP` behave exactly as they do in production.
pub async fn spawn_server_from_file(
    yaml: &str,
    config_path: PathBuf,
) -> Result<(Arc<Exporter>, SocketAddr, JoinHandle<()>)> {
    spawn_server_with_reload(yaml, config_path, true).await
}

/// Like [`spawn_server_from_file`], but lets the caller choose whether
/// `POST /reload` is enabled (`--web.enable-reload`).
pub async fn spawn_server_with_reload(
    yaml: &str,
    config_path: PathBuf,
    web_enable_reload: bool,
) -> Result<(Arc<Exporter>, SocketAddr, JoinHandle<()>)> {
    ensure_drivers_installed();
    let resolved = Config::from_yaml_str_with_target_label(yaml, "target")?;
    let targets = reload::build_targets(&resolved, &HandleReuseMap::new(), "target", true).await?;

    let exp = Exporter::new(
        config_path,
        resolved,
        targets,
        "target".to_string(),
        false,
        true,
        web_enable_reload,
    )?;

    let router = exporter::router(exp.clone(), "/metrics");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    assert!(wait_for_server(addr.port(), 50).await, "test server failed to start");
    Ok((exp, addr, handle))
}

pub fn base_url(addr: SocketAddr) -> String {
    format!("http://{addr}")
}
