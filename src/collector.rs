//! A self-contained group of queries collected together against one target.
//! A collector with a configured `min_interval` wraps its queries behind a
//! `tokio::sync::Mutex`-guarded cache of the last successful refresh, so
//! concurrent scrapes within that window replay the same samples instead of
//! re-running the underlying queries.

use crate::config::CollectorConfig;
use crate::db::Handle;
use crate::errors::{ConfigError, LogContext};
use crate::metric_family::MetricFamily;
use crate::query::Query;
use crate::sample::Metric;
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::{Duration, Instant};
use tracing::debug;

struct RawCollector {
    name: String,
    queries: Vec<Query>,
}

impl RawCollector {
    async fn collect(&self, handle: &Handle, timeout: Option<Duration>, ignore_missing_vals: bool) -> Vec<Metric> {
        let mut tasks = FuturesUnordered::new();
        for q in &self.queries {
            tasks.push(q.collect(handle, timeout, ignore_missing_vals));
        }
        let mut out = Vec::new();
        while let Some(mut metrics) = tasks.next().await {
            out.append(&mut metrics);
        }
        out
    }
}

struct CacheState {
    last_refresh: Option<Instant>,
    cache: Vec<Metric>,
}

struct CachingCollector {
    raw: RawCollector,
    min_interval: Duration,
    state: tokio::sync::Mutex<CacheState>,
}

impl CachingCollector {
    async fn collect(&self, handle: &Handle, timeout: Option<Duration>, ignore_missing_vals: bool) -> Vec<Metric> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let is_stale = state
            .last_refresh
            .is_none_or(|last| now.duration_since(last) > self.min_interval);

        if !is_stale {
            debug!(collector = %self.raw.name, "returning cached metrics");
            return state.cache.clone();
        }

        debug!(collector = %self.raw.name, "collecting fresh metrics");
        let fresh = self.raw.collect(handle, timeout, ignore_missing_vals).await;
        let has_invalid = fresh.iter().any(|m| matches!(m, Metric::Invalid(_)));
        if has_invalid {
            // A deadline or failure produced an invalid sample: return it to
            // this caller but leave the cache untouched so a transient error
            // doesn't get replayed for the rest of min_interval.
            return fresh;
        }
        state.cache = fresh.clone();
        state.last_refresh = Some(now);
        fresh
    }
}

/// Either a plain fan-out collector or one wrapping it with a cache, chosen
/// once at construction time from `min_interval`.
pub enum Collector {
    Plain(RawCollector),
    Caching(CachingCollector),
}

impl Collector {
    pub fn new(
        log_context: LogContext,
        cc: &CollectorConfig,
        const_labels: &[(String, String)],
    ) -> Result<Self, ConfigError> {
        let log_context = log_context.with_collector(cc.name.clone());

        let mut queries = Vec::new();
        for (qc, metrics) in cc.grouped_queries() {
            let families: Vec<MetricFamily> = metrics
                .iter()
                .map(|mc| MetricFamily::new(&log_context, mc, const_labels))
                .collect::<Result<_, _>>()?;
            queries.push(Query::new(log_context.clone(), &qc, families)?);
        }

        let raw = RawCollector {
            name: cc.name.clone(),
            queries,
        };

        let min_interval = cc.min_interval.map(|d| d.as_duration()).unwrap_or_default();
        if min_interval.is_zero() {
            Ok(Self::Plain(raw))
        } else {
            Ok(Self::Caching(CachingCollector {
                raw,
                min_interval,
                state: tokio::sync::Mutex::new(CacheState {
                    last_refresh: None,
                    cache: Vec::new(),
                }),
            }))
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Plain(r) => &r.name,
            Self::Caching(c) => &c.raw.name,
        }
    }

    pub async fn collect(&self, handle: &Handle, timeout: Option<Duration>, ignore_missing_vals: bool) -> Vec<Metric> {
        match self {
            Self::Plain(r) => r.collect(handle, timeout, ignore_missing_vals).await,
            Self::Caching(c) => c.collect(handle, timeout, ignore_missing_vals).await,
        }
    }
}
