//! A single database to scrape: a connection handle plus the collectors to
//! run against it.

use crate::collector::Collector;
use crate::config::{CollectorConfig, GlobalConfig};
use crate::db::{handle_key, Handle, HandleKey};
use crate::errors::{LogContext, ScrapeError};
use crate::internal_metrics::{ScrapeMetrics, ScrapeTimer};
use crate::sample::Metric;
use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Duration;

pub struct Target {
    name: String,
    dsn: String,
    log_context: LogContext,
    handle: Handle,
    collectors: Vec<Collector>,
    enable_ping: bool,
}

impl Target {
    pub async fn new(
        log_context: LogContext,
        name: String,
        dsn: &str,
        collector_configs: &[CollectorConfig],
        const_labels: &[(String, String)],
        globals: &GlobalConfig,
        enable_ping: bool,
    ) -> Result<Self> {
        let handle = Handle::open(
            dsn,
            globals.max_connections,
            globals.max_idle_connections,
            globals.max_connection_lifetime,
        )
        .await?;

        Self::with_handle(log_context, name, dsn, handle, collector_configs, const_labels, enable_ping)
    }

    /// Builds a target against an already-open handle, skipping `Handle::open`
    /// entirely. Used by reload to carry a connection pool's identity across
    /// a configuration swap instead of reconnecting.
    pub fn with_handle(
        log_context: LogContext,
        name: String,
        dsn: &str,
        handle: Handle,
        collector_configs: &[CollectorConfig],
        const_labels: &[(String, String)],
        enable_ping: bool,
    ) -> Result<Self> {
        let log_context = log_context.with_target(name.clone());

        let collectors = collector_configs
            .iter()
            .map(|cc| Collector::new(log_context.clone(), cc, const_labels))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            dsn: dsn.to_string(),
            log_context,
            handle,
            collectors,
            enable_ping,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// The job this target was expanded from, or `None` in single-target mode -
    /// used by the gatherer's `jobs[]` query-string filter.
    #[must_use]
    pub fn job_name(&self) -> Option<&str> {
        self.log_context.job.as_deref()
    }

    /// The handle backing this target, cloned cheaply (it wraps a pool
    /// handle and an id) so a reload can carry it onto a rebuilt target.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// This target's identity for reload's handle-reuse lookup: job name
    /// (empty in single-target mode), target name, and DSN.
    #[must_use]
    pub fn reuse_key(&self) -> HandleKey {
        handle_key(self.log_context.job.as_deref().unwrap_or(""), &self.name, &self.dsn)
    }

    /// Runs every collector against this target concurrently, ping-gating
    /// them first when `enable_ping` is set, short-circuiting the whole
    /// target with one invalid metric rather than letting each collector
    /// fail its own connection attempt. `timeout` of `None` means no scrape
    /// deadline. When `scrape_metrics` is provided, each collector's wall
    /// time and success/failure is recorded against it.
    pub async fn collect(
        &self,
        timeout: Option<Duration>,
        ignore_missing_vals: bool,
        scrape_metrics: Option<&ScrapeMetrics>,
    ) -> Vec<Metric> {
        if self.enable_ping {
            if let Err(source) = self.handle.ping(timeout).await {
                return vec![Metric::invalid(ScrapeError::new(
                    self.log_context.clone(),
                    format!("ping failed: {source}"),
                ))];
            }
        }

        let mut tasks = FuturesUnordered::new();
        for collector in &self.collectors {
            tasks.push(self.collect_one(collector, timeout, ignore_missing_vals, scrape_metrics));
        }

        let mut out = Vec::new();
        while let Some(mut metrics) = tasks.next().await {
            out.append(&mut metrics);
        }
        out
    }

    async fn collect_one(
        &self,
        collector: &Collector,
        timeout: Option<Duration>,
        ignore_missing_vals: bool,
        scrape_metrics: Option<&ScrapeMetrics>,
    ) -> Vec<Metric> {
        let timer = scrape_metrics.map(|m| ScrapeTimer::start(m, self.name.as_str(), collector.name()));
        let metrics = collector.collect(&self.handle, timeout, ignore_missing_vals).await;
        if let Some(timer) = timer {
            let ok = !metrics.iter().any(|m| matches!(m, Metric::Invalid(_)));
            timer.finish(ok);
        }
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::duration::ConfigDuration;
    use crate::config::MetricConfig;

    fn globals() -> GlobalConfig {
        GlobalConfig {
            min_interval: ConfigDuration::zero(),
            scrape_timeout: ConfigDuration::from_secs(10),
            scrape_timeout_offset: ConfigDuration::from_millis(500),
            scrape_error_drop_interval: ConfigDuration::zero(),
            max_connection_lifetime: ConfigDuration::zero(),
            max_connections: 3,
            max_idle_connections: 3,
        }
    }

    fn collector_config() -> CollectorConfig {
        CollectorConfig {
            name: "c".to_string(),
            min_interval: None,
            metrics: vec![MetricConfig::default_for_test()],
            queries: vec![],
        }
    }

    #[tokio::test]
    async fn collects_metrics_from_every_collector() {
        let target = Target::new(
            LogContext::default(),
            "t".to_string(),
            "sqlite::memory:",
            &[collector_config()],
            &[("job".to_string(), "j".to_string())],
            &globals(),
            false,
        )
        .await
        .unwrap();

        let metrics = target.collect(Some(Duration::from_secs(1)), false, None).await;
        assert_eq!(metrics.len(), 1);
    }

    #[tokio::test]
    async fn successful_ping_still_runs_collectors() {
        let target = Target::new(
            LogContext::default(),
            "t".to_string(),
            "sqlite::memory:",
            &[collector_config()],
            &[],
            &globals(),
            true,
        )
        .await
        .unwrap();

        let metrics = target.collect(Some(Duration::from_secs(1)), false, None).await;
        assert_eq!(metrics.len(), 1);
        assert!(matches!(metrics[0], Metric::Sample(_)));
    }

    #[tokio::test]
    async fn collecting_with_scrape_metrics_records_success_per_collector() {
        use prometheus::Registry;

        let target = Target::new(
            LogContext::default(),
            "t".to_string(),
            "sqlite::memory:",
            &[collector_config()],
            &[],
            &globals(),
            false,
        )
        .await
        .unwrap();

        let scrapes = ScrapeMetrics::new();
        let registry = Registry::new();
        scrapes.register(&registry).unwrap();

        let metrics = target.collect(Some(Duration::from_secs(1)), false, Some(&scrapes)).await;
        assert_eq!(metrics.len(), 1);

        let families = registry.gather();
        let success = families
            .iter()
            .find(|f| f.name() == "sql_exporter_collector_last_scrape_success")
            .expect("last_scrape_success registered");
        let metric = success.get_metric().first().expect("one (target, collector) series");
        assert_eq!(metric.get_gauge().value(), 1.0);
    }
}
