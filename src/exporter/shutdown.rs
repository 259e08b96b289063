//! Graceful shutdown on SIGINT/SIGTERM, passed to `axum::serve(...).with_graceful_shutdown(...)`.

use tokio::signal;
use tracing::info;

/// Resolves once either Ctrl-C or (on Unix) SIGTERM is received, logging
/// which one triggered the shutdown.
pub async fn signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
