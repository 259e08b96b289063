//! Self-monitoring: the exporter's own process resource usage and
//! per-collector scrape performance, exposed on `/sql_exporter_metrics`.
//! This tracks a fixed (non-per-scrape) set of metrics, so, unlike
//! [`crate::metric_family`], it uses `prometheus::Registry` directly
//! instead of hand-built samples.

use anyhow::Result;
use prometheus::{Counter, CounterVec, Gauge, GaugeVec, HistogramVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use sysinfo::{Pid, System};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ProcessCollector {
    cpu_seconds_total: Counter,
    cpu_cores: IntGauge,
    resident_memory_bytes: IntGauge,
    virtual_memory_bytes: IntGauge,
    open_fds: IntGauge,
    threads: IntGauge,
    start_time_seconds: Gauge,
    state: Arc<parking_lot::Mutex<ProcessState>>,
    pid: Pid,
}

struct ProcessState {
    system: System,
    last_cpu_time: Option<Duration>,
    last_collection: Option<Instant>,
}

impl ProcessCollector {
    #[must_use]
    pub fn new() -> Self {
        let cpu_seconds_total = Counter::with_opts(Opts::new(
            "sql_exporter_process_cpu_seconds_total",
            "Total user and system CPU time spent in seconds",
        ))
        .unwrap_or_else(|_| unreachable!("static metric options are always valid"));
        let cpu_cores = IntGauge::with_opts(Opts::new(
            "sql_exporter_process_cpu_cores",
            "Number of CPU cores available to the system",
        ))
        .unwrap_or_else(|_| unreachable!("static metric options are always valid"));
        let resident_memory_bytes = IntGauge::with_opts(Opts::new(
            "sql_exporter_process_resident_memory_bytes",
            "Resident memory size in bytes",
        ))
        .unwrap_or_else(|_| unreachable!("static metric options are always valid"));
        let virtual_memory_bytes = IntGauge::with_opts(Opts::new(
            "sql_exporter_process_virtual_memory_bytes",
            "Virtual memory size in bytes",
        ))
        .unwrap_or_else(|_| unreachable!("static metric options are always valid"));
        let open_fds = IntGauge::with_opts(Opts::new(
            "sql_exporter_process_open_fds",
            "Number of open file descriptors",
        ))
        .unwrap_or_else(|_| unreachable!("static metric options are always valid"));
        let threads = IntGauge::with_opts(Opts::new(
            "sql_exporter_process_threads",
            "Number of OS threads in the process",
        ))
        .unwrap_or_else(|_| unreachable!("static metric options are always valid"));
        let start_time_seconds = Gauge::with_opts(Opts::new(
            "sql_exporter_process_start_time_seconds",
            "Start time of the process since unix epoch in seconds",
        ))
        .unwrap_or_else(|_| unreachable!("static metric options are always valid"));

        let system = System::new_all();
        cpu_cores.set(i64::try_from(system.cpus().len().max(1)).unwrap_or(1));
        start_time_seconds.set(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64(),
        );

        Self {
            cpu_seconds_total,
            cpu_cores,
            resident_memory_bytes,
            virtual_memory_bytes,
            open_fds,
            threads,
            start_time_seconds,
            state: Arc::new(parking_lot::Mutex::new(ProcessState {
                system,
                last_cpu_time: None,
                last_collection: None,
            })),
            pid: Pid::from(std::process::id() as usize),
        }
    }

    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.cpu_seconds_total.clone()))?;
        registry.register(Box::new(self.cpu_cores.clone()))?;
        registry.register(Box::new(self.resident_memory_bytes.clone()))?;
        registry.register(Box::new(self.virtual_memory_bytes.clone()))?;
        registry.register(Box::new(self.open_fds.clone()))?;
        registry.register(Box::new(self.threads.clone()))?;
        registry.register(Box::new(self.start_time_seconds.clone()))?;
        Ok(())
    }

    pub fn collect(&self) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.system.refresh_all();

        let Some(process) = state.system.process(self.pid) else {
            return;
        };
        self.resident_memory_bytes
            .set(i64::try_from(process.memory()).unwrap_or(i64::MAX));
        self.virtual_memory_bytes
            .set(i64::try_from(process.virtual_memory()).unwrap_or(i64::MAX));

        let current_cpu_time = Duration::from_secs(process.run_time());
        if let (Some(last_cpu), Some(last_time)) = (state.last_cpu_time, state.last_collection) {
            let elapsed = now.duration_since(last_time);
            if elapsed.as_secs_f64() > 0.1 {
                let delta = current_cpu_time.saturating_sub(last_cpu).as_secs_f64();
                if delta > 0.0 {
                    self.cpu_seconds_total.inc_by(delta);
                }
            }
        }
        state.last_cpu_time = Some(current_cpu_time);
        state.last_collection = Some(now);

        #[cfg(target_os = "linux")]
        {
            if let Ok(entries) = std::fs::read_dir(format!("/proc/{}/task", self.pid)) {
                self.threads.set(i64::try_from(entries.count()).unwrap_or(0));
            }
            if let Ok(entries) = std::fs::read_dir(format!("/proc/{}/fd", self.pid)) {
                self.open_fds.set(i64::try_from(entries.count()).unwrap_or(0));
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            self.threads.set(1);
            self.open_fds.set(0);
        }
    }
}

impl Default for ProcessCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-collector scrape performance, labeled by `collector` and `target`.
///
/// `scrape_errors_total` lives behind a lock rather than as a plain field:
/// `reset_errors` swaps in a freshly registered `CounterVec` so
/// `scrape_error_drop_interval` can clear accumulated error counts on a
/// ticker, since `CounterVec` itself has no reset operation.
#[derive(Clone)]
pub struct ScrapeMetrics {
    pub scrape_duration_seconds: HistogramVec,
    scrape_errors_total: Arc<parking_lot::RwLock<CounterVec>>,
    pub last_scrape_timestamp: GaugeVec,
    pub last_scrape_success: GaugeVec,
    pub metrics_total: IntGauge,
}

impl ScrapeMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scrape_duration_seconds: HistogramVec::new(
                prometheus::HistogramOpts::new(
                    "sql_exporter_collector_scrape_duration_seconds",
                    "Time spent scraping each collector in seconds",
                )
                .buckets(vec![
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
                ]),
                &["target", "collector"],
            )
            .unwrap_or_else(|_| unreachable!("static metric options are always valid")),
            scrape_errors_total: Arc::new(parking_lot::RwLock::new(new_scrape_errors_vec())),
            last_scrape_timestamp: GaugeVec::new(
                Opts::new(
                    "sql_exporter_collector_last_scrape_timestamp_seconds",
                    "Unix timestamp of the last scrape attempt",
                ),
                &["target", "collector"],
            )
            .unwrap_or_else(|_| unreachable!("static metric options are always valid")),
            last_scrape_success: GaugeVec::new(
                Opts::new(
                    "sql_exporter_collector_last_scrape_success",
                    "Whether the last scrape was successful (1=success, 0=failure)",
                ),
                &["target", "collector"],
            )
            .unwrap_or_else(|_| unreachable!("static metric options are always valid")),
            metrics_total: IntGauge::with_opts(Opts::new(
                "sql_exporter_metrics_total",
                "Total number of metrics currently exported",
            ))
            .unwrap_or_else(|_| unreachable!("static metric options are always valid")),
        }
    }

    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.scrape_duration_seconds.clone()))?;
        registry.register(Box::new(self.scrape_errors_total.read().clone()))?;
        registry.register(Box::new(self.last_scrape_timestamp.clone()))?;
        registry.register(Box::new(self.last_scrape_success.clone()))?;
        registry.register(Box::new(self.metrics_total.clone()))?;
        Ok(())
    }

    /// Unregisters the current `scrape_errors_total` and replaces it with a
    /// fresh, empty one under the same name - the `scrape_error_drop_interval`
    /// ticker's periodic reset.
    pub fn reset_errors(&self, registry: &Registry) -> Result<()> {
        let mut current = self.scrape_errors_total.write();
        let _ = registry.unregister(Box::new(current.clone()));
        let fresh = new_scrape_errors_vec();
        registry.register(Box::new(fresh.clone()))?;
        *current = fresh;
        Ok(())
    }

    pub fn record(&self, target: &str, collector: &str, duration: Duration, ok: bool) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        self.scrape_duration_seconds
            .with_label_values(&[target, collector])
            .observe(duration.as_secs_f64());
        self.last_scrape_timestamp
            .with_label_values(&[target, collector])
            .set(now);
        self.last_scrape_success
            .with_label_values(&[target, collector])
            .set(if ok { 1.0 } else { 0.0 });
    }

    pub fn record_error(&self, job: &str, target: &str, collector: &str, query: &str) {
        self.scrape_errors_total
            .read()
            .with_label_values(&[job, target, collector, query])
            .inc();
    }
}

fn new_scrape_errors_vec() -> CounterVec {
    CounterVec::new(
        Opts::new(
            "sql_exporter_collector_scrape_errors_total",
            "Total number of scrape errors per target and collector",
        ),
        &["job", "target", "collector", "query"],
    )
    .unwrap_or_else(|_| unreachable!("static metric options are always valid"))
}

impl Default for ScrapeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// All self-monitoring state, registered once at startup.
#[derive(Clone)]
pub struct InternalMetrics {
    pub process: ProcessCollector,
    pub scrapes: ScrapeMetrics,
}

impl InternalMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let process = ProcessCollector::new();
        let scrapes = ScrapeMetrics::new();
        process.register(registry)?;
        scrapes.register(registry)?;
        Ok(Self { process, scrapes })
    }

    pub fn collect_process(&self) {
        self.process.collect();
        debug!("collected internal process metrics");
    }
}

/// RAII timer recording a collector scrape's duration and outcome. Owns a
/// clone of `ScrapeMetrics` (itself just a bundle of `Arc`-backed prometheus
/// handles) rather than borrowing one, so it can be held across the `.await`
/// points of a collector's own future without entangling its lifetime with
/// the borrow of the `Target`/`Exporter` that started it.
pub struct ScrapeTimer {
    target: String,
    collector: String,
    start: Instant,
    metrics: ScrapeMetrics,
    outcome: Option<bool>,
}

impl ScrapeTimer {
    #[must_use]
    pub fn start(metrics: &ScrapeMetrics, target: impl Into<String>, collector: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            collector: collector.into(),
            start: Instant::now(),
            metrics: metrics.clone(),
            outcome: None,
        }
    }

    pub fn finish(mut self, ok: bool) {
        self.outcome = Some(ok);
    }
}

impl Drop for ScrapeTimer {
    fn drop(&mut self) {
        let ok = self.outcome.unwrap_or(true);
        if self.outcome.is_none() {
            warn!(collector = %self.collector, "scrape timer dropped without an explicit outcome");
        }
        self.metrics
            .record(&self.target, &self.collector, self.start.elapsed(), ok);
    }
}
