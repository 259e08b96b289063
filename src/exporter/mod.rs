//! The HTTP-facing gatherer: holds the live target list and resolved
//! configuration, runs a scrape across them on every `/metrics` request, and
//! exposes the supporting routes (health, config view, reload, probe). The
//! router wires in a request-id header, its propagation to the response,
//! and request tracing as a shared `tower` middleware stack.

mod handlers;
mod render;
pub mod shutdown;

use crate::config::{CollectorConfig, ResolvedConfig};
use crate::errors::LogContext;
use crate::internal_metrics::InternalMetrics;
use crate::reload;
use crate::sample::{Metric, SampleMetric};
use crate::target::Target;
use anyhow::Result;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::routing::{get, post};
use axum::Router;
use axum::body::Body;
use prometheus::Registry;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::request_id::PropagateRequestIdLayer;
use tower_http::set_header::SetRequestHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug_span, Span};

/// The outcome of one `/metrics` scrape: the rendered text, how many samples
/// it carries, and - when it carries none - the first scrape error seen, so
/// the handler can report something more useful than an empty body.
pub struct GatherResult {
    pub text: String,
    pub sample_count: usize,
    pub first_error: Option<String>,
}

struct State {
    config: ResolvedConfig,
    targets: Vec<Target>,
    collectors_by_name: HashMap<String, CollectorConfig>,
}

/// Everything the HTTP surface needs: the live scrape state plus the
/// self-monitoring registry from [`crate::internal_metrics`].
pub struct Exporter {
    state: RwLock<State>,
    config_path: PathBuf,
    target_label: String,
    ignore_missing_values: bool,
    default_enable_ping: bool,
    web_enable_reload: bool,
    registry: Registry,
    internal: InternalMetrics,
}

impl Exporter {
    /// # Errors
    /// Returns an error if the internal self-metrics fail to register.
    pub fn new(
        config_path: PathBuf,
        config: ResolvedConfig,
        targets: Vec<Target>,
        target_label: String,
        ignore_missing_values: bool,
        default_enable_ping: bool,
        web_enable_reload: bool,
    ) -> Result<Arc<Self>> {
        let registry = Registry::new();
        let internal = InternalMetrics::new(&registry)?;
        let collectors_by_name = collectors_by_name(&config);

        Ok(Arc::new(Self {
            state: RwLock::new(State {
                config,
                targets,
                collectors_by_name,
            }),
            config_path,
            target_label,
            ignore_missing_values,
            default_enable_ping,
            web_enable_reload,
            registry,
            internal,
        }))
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn web_enable_reload(&self) -> bool {
        self.web_enable_reload
    }

    /// Refreshes the process-resource self-metrics just before they're
    /// encoded, rather than on a background tick - cheap enough to pay on
    /// every `/sql_exporter_metrics` request.
    pub fn refresh_internal_metrics(&self) {
        self.internal.collect_process();
    }

    /// Clears accumulated `scrape_errors_total` counts - the
    /// `scrape_error_drop_interval` ticker's action.
    ///
    /// # Errors
    /// Propagates a failure re-registering the reset counter.
    pub fn reset_scrape_errors(&self) -> Result<()> {
        self.internal.scrapes.reset_errors(&self.registry)
    }

    /// The `global.scrape_error_drop_interval` from the live configuration,
    /// or `Duration::ZERO` when unset (meaning: never reset automatically).
    pub async fn scrape_error_drop_interval(&self) -> Duration {
        self.state.read().await.config.globals.scrape_error_drop_interval.as_duration()
    }

    /// The per-request scrape deadline: `header_seconds` (from
    /// `X-Prometheus-Scrape-Timeout-Seconds`) minus `scrape_timeout_offset`,
    /// clamped to `scrape_timeout`. If the offset is at least as large as
    /// the header value, the offset is ignored and the raw header value is
    /// used instead. Falls back to `scrape_timeout` outright when no header
    /// was sent. A configured `scrape_timeout` of zero means no deadline at
    /// all; this is reported as `None` so callers skip the timeout wrapper
    /// entirely rather than racing against an immediate deadline.
    pub async fn effective_timeout(&self, header_seconds: Option<f64>) -> Option<Duration> {
        let globals = self.state.read().await.config.globals.clone();
        let configured = globals.scrape_timeout.as_duration();
        let no_deadline = configured.is_zero();

        let Some(header_seconds) = header_seconds else {
            return if no_deadline { None } else { Some(configured) };
        };

        let offset = globals.scrape_timeout_offset.as_duration().as_secs_f64();
        let effective_secs = if offset >= header_seconds {
            header_seconds
        } else {
            header_seconds - offset
        };
        let effective = Duration::from_secs_f64(effective_secs.max(0.0));

        Some(if no_deadline { effective } else { effective.min(configured) })
    }

    /// Runs the full reload procedure and swaps in the rebuilt config/targets
    /// on success, leaving the live state untouched on failure.
    ///
    /// # Errors
    /// Propagates any error from loading or rebuilding the configuration.
    pub async fn reload(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let (config, targets) = reload::reload(
            &self.config_path,
            &state.config,
            &state.targets,
            &self.target_label,
            self.default_enable_ping,
        )
        .await?;
        state.collectors_by_name = collectors_by_name(&config);
        state.config = config;
        state.targets = targets;
        Ok(())
    }

    /// Re-reads only the collector files named by `collector_files`, without
    /// touching targets or job/target definitions - the narrower reload
    /// exposed separately from a full config reload.
    ///
    /// # Errors
    /// Propagates any error from re-parsing the configuration file.
    pub async fn reload_collector_files(&self) -> Result<()> {
        self.reload().await
    }

    /// Renders a YAML view of the live resolved configuration, with every
    /// DSN redacted.
    ///
    /// # Errors
    /// Propagates a YAML serialization failure.
    pub async fn config_yaml(&self) -> Result<String> {
        let state = self.state.read().await;
        Ok(crate::config::Config::yaml(&state.config)?)
    }

    /// Scrapes every target matching `job_filter` (all of them, when `None`)
    /// within `timeout` (no deadline when `None`), aggregating their samples
    /// into one rendered body and rolling any invalid metrics into
    /// `scrape_errors_total`.
    pub async fn gather(&self, job_filter: Option<&[String]>, timeout: Option<Duration>) -> GatherResult {
        let state = self.state.read().await;
        let filter: Option<HashSet<&str>> = job_filter.map(|jobs| jobs.iter().map(String::as_str).collect());

        let mut tasks = futures::stream::FuturesUnordered::new();
        for target in &state.targets {
            if let Some(filter) = &filter {
                if !filter.contains(target.job_name().unwrap_or("")) {
                    continue;
                }
            }
            tasks.push(target.collect(timeout, self.ignore_missing_values, Some(&self.internal.scrapes)));
        }

        let (samples, first_error) = Self::drain(tasks, &self.internal).await;
        let text = render::render_text(&samples);
        self.internal
            .scrapes
            .metrics_total
            .set(i64::try_from(samples.len()).unwrap_or(i64::MAX));

        GatherResult {
            text,
            sample_count: samples.len(),
            first_error,
        }
    }

    /// Builds a disposable, single-target exporter for `dsn` and runs one
    /// scrape against it - the `/probe` endpoint. `collector_names`
    /// restricts the run to the named collectors from the live config, or
    /// every known collector when empty.
    ///
    /// # Errors
    /// Returns an error if `dsn` cannot be opened, or a named collector
    /// isn't defined anywhere in the live configuration.
    pub async fn probe(
        &self,
        dsn: &str,
        collector_names: Option<&[String]>,
        timeout: Option<Duration>,
    ) -> Result<GatherResult> {
        let (collectors, globals) = {
            let state = self.state.read().await;
            let collectors = match collector_names {
                Some(names) if !names.is_empty() => {
                    let mut out = Vec::with_capacity(names.len());
                    for name in names {
                        let cc = state
                            .collectors_by_name
                            .get(name)
                            .ok_or_else(|| anyhow::anyhow!("unknown collector {name:?}"))?;
                        out.push(cc.clone());
                    }
                    out
                }
                _ => state.collectors_by_name.values().cloned().collect(),
            };
            (collectors, state.config.globals.clone())
        };

        let target = Target::new(
            LogContext::default(),
            "probe".to_string(),
            dsn,
            &collectors,
            &[],
            &globals,
            true,
        )
        .await?;

        let mut tasks = futures::stream::FuturesUnordered::new();
        tasks.push(target.collect(timeout, self.ignore_missing_values, Some(&self.internal.scrapes)));
        let (samples, first_error) = Self::drain(tasks, &self.internal).await;
        let text = render::render_text(&samples);

        Ok(GatherResult {
            text,
            sample_count: samples.len(),
            first_error,
        })
    }

    async fn drain(
        mut tasks: futures::stream::FuturesUnordered<impl std::future::Future<Output = Vec<Metric>>>,
        internal: &InternalMetrics,
    ) -> (Vec<SampleMetric>, Option<String>) {
        use futures::stream::StreamExt;

        let mut samples = Vec::new();
        let mut first_error = None;
        while let Some(metrics) = tasks.next().await {
            for metric in metrics {
                match metric {
                    Metric::Sample(s) => samples.push(s),
                    Metric::Invalid(err) => {
                        let [job, target, collector, query] = err.context.label_values();
                        internal.scrapes.record_error(&job, &target, &collector, &query);
                        tracing::warn!(%err, "scrape produced an invalid metric");
                        if first_error.is_none() {
                            first_error = Some(err.to_string());
                        }
                    }
                }
            }
        }
        (samples, first_error)
    }
}

fn collectors_by_name(resolved: &ResolvedConfig) -> HashMap<String, CollectorConfig> {
    let mut map = HashMap::new();
    if let Some((_, collectors)) = &resolved.target {
        for c in collectors {
            map.entry(c.name.clone()).or_insert_with(|| c.clone());
        }
    }
    for (_, collectors) in &resolved.jobs {
        for c in collectors {
            map.entry(c.name.clone()).or_insert_with(|| c.clone());
        }
    }
    map
}

/// Builds the full HTTP router: `/metrics`, `/sql_exporter_metrics`,
/// `/healthz`, `/`, `/config`, `/reload`, `/probe`, with a shared
/// request-id/tracing middleware stack applied over every route.
pub fn router(exporter: Arc<Exporter>, metrics_path: &str) -> Router {
    let request_counter = Arc::new(AtomicU64::new(0));

    Router::new()
        .route(metrics_path, get(handlers::metrics::handler))
        .route("/sql_exporter_metrics", get(handlers::metrics::internal_handler))
        .route("/healthz", get(handlers::health::handler))
        .route("/", get(handlers::health::landing_page))
        .route("/config", get(handlers::config_view::handler))
        .route("/reload", post(handlers::reload::handler))
        .route("/probe", get(handlers::probe::handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    move |_req: &Request<Body>| {
                        let id = request_counter.fetch_add(1, Ordering::Relaxed);
                        HeaderValue::from_str(&id.to_string()).ok()
                    },
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static("x-request-id")))
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        )
        .with_state(exporter)
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    debug_span!("http-request", path = request.uri().path(), request_id)
}
