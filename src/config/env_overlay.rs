//! Environment-variable overlay applied after YAML parsing and before
//! collector-reference resolution: one pass keyed by a shared
//! `SQLEXPORTER_` prefix, since serde has no built-in env-overlay derive.

use crate::config::duration::ConfigDuration;
use crate::config::global::GlobalConfig;
use crate::config::secret::Secret;
use crate::config::target::TargetConfig;
use std::env;

const PREFIX: &str = "SQLEXPORTER_";

fn var(suffix: &str) -> Option<String> {
    env::var(format!("{PREFIX}{suffix}")).ok().filter(|v| !v.is_empty())
}

fn duration_var(suffix: &str, into: &mut ConfigDuration) {
    if let Some(v) = var(suffix) {
        if let Ok(d) = crate::config::duration::parse_duration(&v) {
            *into = ConfigDuration::from(d);
        }
    }
}

pub fn apply_global_overlay(global: &mut GlobalConfig) {
    duration_var("MIN_INTERVAL", &mut global.min_interval);
    duration_var("SCRAPE_TIMEOUT", &mut global.scrape_timeout);
    duration_var("SCRAPE_TIMEOUT_OFFSET", &mut global.scrape_timeout_offset);
    duration_var(
        "SCRAPE_ERROR_DROP_INTERVAL",
        &mut global.scrape_error_drop_interval,
    );
    duration_var("MAX_CONNECTION_LIFETIME", &mut global.max_connection_lifetime);
    if let Some(v) = var("MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
        global.max_connections = v;
    }
    if let Some(v) = var("MAX_IDLE_CONNECTIONS").and_then(|v| v.parse().ok()) {
        global.max_idle_connections = v;
    }
}

/// Overlay for the single-`target:` scrape mode, where the whole target is
/// commonly supplied through the environment rather than YAML (e.g. to keep
/// a DSN out of a mounted ConfigMap).
pub fn apply_target_overlay(target: &mut TargetConfig) {
    if let Some(v) = var("TARGET_NAME") {
        target.name = v;
    }
    if let Some(v) = var("TARGET_DSN") {
        target.dsn = Secret::new(v);
    }
    if let Some(v) = var("TARGET_AWS_SECRET_NAME") {
        target.aws_secret_name = Some(v);
    }
    if let Some(v) = var("TARGET_COLLECTORS") {
        target.collector_refs = v.split(',').map(str::trim).map(str::to_string).collect();
    }
    if let Some(v) = var("TARGET_ENABLE_PING") {
        if let Ok(b) = v.parse() {
            target.enable_ping = Some(b);
        }
    }
}
