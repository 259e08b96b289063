//! Command-line surface: a single flat `clap` derive struct, since this
//! exporter has no subcommands.

pub mod telemetry;

use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = if let Some(hash) = built_info::GIT_COMMIT_HASH {
    hash
} else {
    ":-("
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default())
}

/// Database-agnostic SQL metric exporter for Prometheus.
#[derive(Parser, Debug)]
#[command(
    name = "sql_exporter",
    version,
    long_version = GIT_COMMIT_HASH,
    styles = styles(),
)]
pub struct Cli {
    /// Address to listen on for web interface and telemetry
    #[arg(long = "web.listen-address", env = "SQLEXPORTER_WEB_LISTEN_ADDRESS", default_value = ":9399")]
    pub web_listen_address: String,

    /// Path under which to expose metrics
    #[arg(long = "web.metrics-path", env = "SQLEXPORTER_WEB_METRICS_PATH", default_value = "/metrics")]
    pub web_metrics_path: String,

    /// Path to a webserver TLS/basic-auth configuration file (passed through
    /// to the webserver wrapper - this crate only names it)
    #[arg(long = "web.config.file", env = "SQLEXPORTER_WEB_CONFIG_FILE", default_value = "")]
    pub web_config_file: String,

    /// Enable the POST /reload endpoint
    #[arg(long = "web.enable-reload", env = "SQLEXPORTER_WEB_ENABLE_RELOAD", default_value_t = false)]
    pub web_enable_reload: bool,

    /// Path to the exporter configuration file
    #[arg(long = "config.file", env = "SQLEXPORTER_CONFIG", default_value = "sql_exporter.yml")]
    pub config_file: String,

    /// Ping targets before running their collectors
    #[arg(long = "config.enable-ping", default_value_t = true)]
    pub config_enable_ping: bool,

    /// Downgrade a query's missing-column errors to a logged skip
    #[arg(long = "config.ignore-missing-values", default_value_t = false)]
    pub config_ignore_missing_values: bool,

    /// Data source name for single-target mode, overriding `target:` in the config file
    #[arg(long = "config.data-source-name", default_value = "")]
    pub config_data_source_name: String,

    /// Label name that carries the target name on every sample
    #[arg(long = "config.target-label", default_value = "target")]
    pub config_target_label: String,

    /// Minimum log level
    #[arg(long = "log.level", default_value = "info")]
    pub log_level: String,

    /// Log line format: logfmt or json
    #[arg(long = "log.format", default_value = "logfmt")]
    pub log_format: String,

    /// Write logs to this file instead of stderr
    #[arg(long = "log.file", default_value = "")]
    pub log_file: String,
}

impl Cli {
    #[must_use]
    pub fn target_label(&self) -> &str {
        if self.config_target_label.is_empty() {
            "target"
        } else {
            &self.config_target_label
        }
    }

    /// The TCP port carried by `--web.listen-address`, in `:PORT` or
    /// `host:PORT` form - the only two shapes the flag's default and
    /// documented examples use.
    pub fn port(&self) -> anyhow::Result<u16> {
        let addr = &self.web_listen_address;
        let port_str = addr.rsplit(':').next().unwrap_or(addr);
        port_str
            .parse()
            .map_err(|source| anyhow::anyhow!("invalid --web.listen-address {addr:?}: {source}"))
    }
}
