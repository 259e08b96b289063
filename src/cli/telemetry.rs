//! Structured logging setup, driven by `--log.level`, `--log.format` and
//! `--log.file`. Built on `tracing-subscriber`.

use anyhow::{Context, Result};
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Guards the non-blocking file writer, when `--log.file` is set. Dropping
/// this flushes the last batch of log lines; the caller keeps it alive for
/// the process lifetime.
#[must_use = "dropping the guard stops the non-blocking log writer from flushing"]
pub enum LogGuard {
    Stderr,
    File(WorkerGuard),
}

/// Initializes the global `tracing` subscriber. `level` is one of the
/// standard level names (case-insensitive); `format` is `logfmt` or `json`;
/// `file` is a path to log to instead of stderr, or empty for stderr.
///
/// # Errors
/// Returns an error if `level` doesn't parse or the global subscriber is
/// already set.
pub fn init(level: &str, format: &str, file: &str) -> Result<LogGuard> {
    let level = Level::from_str(level).with_context(|| format!("invalid --log.level {level:?}"))?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let json = format.eq_ignore_ascii_case("json");

    if file.is_empty() {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true);
        if json {
            subscriber.json().try_init()
        } else {
            subscriber.compact().try_init()
        }
        .map_err(|e| anyhow::anyhow!("{e}"))?;
        Ok(LogGuard::Stderr)
    } else {
        let file_appender = tracing_appender::rolling::never(
            std::path::Path::new(file).parent().unwrap_or_else(|| std::path::Path::new(".")),
            std::path::Path::new(file)
                .file_name()
                .map_or_else(|| file.to_string(), |n| n.to_string_lossy().into_owned()),
        );
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(writer)
            .with_ansi(false);
        if json {
            subscriber.json().try_init()
        } else {
            subscriber.compact().try_init()
        }
        .map_err(|e| anyhow::anyhow!("{e}"))?;
        Ok(LogGuard::File(guard))
    }
}
