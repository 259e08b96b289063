//! Process entry point: parses flags, loads the configuration, builds the
//! initial target list and serves the HTTP surface until a shutdown signal
//! arrives.

use anyhow::{Context, Result};
use sql_exporter::cli::Cli;
use sql_exporter::config::{Config, Secret};
use sql_exporter::db::HandleReuseMap;
use sql_exporter::exporter::{self, Exporter};
use sql_exporter::reload;
use clap::Parser;
use std::net::SocketAddr;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    sqlx::any::install_default_drivers();

    let cli = Cli::parse();
    let _log_guard = sql_exporter::cli::telemetry::init(&cli.log_level, &cli.log_format, &cli.log_file)
        .context("initializing logging")?;

    if let Err(err) = run(cli).await {
        error!(%err, "sql_exporter exited with an error");
        return Err(err);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut resolved =
        Config::load_with_target_label(&cli.config_file, cli.target_label()).context("loading configuration")?;

    if !cli.config_data_source_name.is_empty() {
        if let Some((target, _)) = &mut resolved.target {
            target.dsn = Secret::new(cli.config_data_source_name.clone());
        }
    }

    let targets = reload::build_targets(&resolved, &HandleReuseMap::new(), cli.target_label(), cli.config_enable_ping)
        .await
        .context("opening target database handles")?;

    let exporter = Exporter::new(
        std::path::PathBuf::from(&cli.config_file),
        resolved,
        targets,
        cli.target_label().to_string(),
        cli.config_ignore_missing_values,
        cli.config_enable_ping,
        cli.web_enable_reload,
    )
    .context("starting exporter")?;

    spawn_error_reset_ticker(exporter.clone());
    spawn_reload_signal_handler(exporter.clone());

    let router = exporter::router(exporter.clone(), &cli.web_metrics_path);
    let port = cli.port().context("parsing --web.listen-address")?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, config = %cli.config_file, "sql_exporter starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(exporter::shutdown::signal())
        .await
        .context("serving HTTP")?;

    info!("sql_exporter stopped");
    Ok(())
}

/// Ticks `global.scrape_error_drop_interval` and clears accumulated
/// `scrape_errors_total` counts on each fire - a no-op loop when the
/// interval is unset.
fn spawn_error_reset_ticker(exporter: std::sync::Arc<Exporter>) {
    tokio::spawn(async move {
        loop {
            let interval = exporter.scrape_error_drop_interval().await;
            if interval.is_zero() {
                return;
            }
            tokio::time::sleep(interval).await;
            if let Err(err) = exporter.reset_scrape_errors() {
                error!(%err, "failed to reset scrape error counters");
            }
        }
    });
}

/// Reloads the configuration on SIGHUP, picking up edited collector/job
/// definitions without a restart.
#[cfg(unix)]
fn spawn_reload_signal_handler(exporter: std::sync::Arc<Exporter>) {
    tokio::spawn(async move {
        let Ok(mut hangup) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) else {
            error!("failed to install SIGHUP handler");
            return;
        };
        loop {
            hangup.recv().await;
            info!("received SIGHUP, reloading configuration");
            if let Err(err) = exporter.reload().await {
                error!(%err, "reload failed, continuing with the previous configuration");
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_signal_handler(_exporter: std::sync::Arc<Exporter>) {}
