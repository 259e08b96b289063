//! Error taxonomy.
//!
//! Configuration errors are typed so tests and the reload path can match on
//! the exact failure instead of grepping a message. Everything else that
//! can happen during a scrape (connection, query, projection, deadline)
//! is collapsed into [`ScrapeError`], which is what actually travels on the
//! sample channel as an invalid-metric. Kind 6 (an internal invariant
//! violation) is never represented as a value - it panics where it is
//! detected.

use std::fmt;
use std::sync::Arc;

/// Configuration-time errors: fail process startup or a reload, never seen by scrapers.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("exactly one of `jobs` and `target` must be defined")]
    MissingScrapeMode,

    #[error("unknown fields in {ctx}: {}", .keys.join(", "))]
    UnknownFields { ctx: String, keys: Vec<String> },

    #[error("global.scrape_timeout_offset must be strictly positive, have {0}")]
    NonPositiveTimeoutOffset(String),

    #[error("no collectors defined for {0}")]
    NoCollectors(String),

    #[error("duplicate collector reference {reference:?} in {ctx}")]
    DuplicateCollectorRef { reference: String, ctx: String },

    #[error("bad collector {reference:?} referenced in {ctx}: {source}")]
    BadCollectorGlob {
        reference: String,
        ctx: String,
        source: glob::PatternError,
    },

    #[error("unknown collector {reference:?} referenced in {ctx}")]
    UnresolvedCollectorRef { reference: String, ctx: String },

    #[error("duplicate collector name: {0}")]
    DuplicateCollectorName(String),

    #[error("missing name for collector")]
    MissingCollectorName,

    #[error("duplicate query name {0:?} within collector")]
    DuplicateQueryName(String),

    #[error("no metrics defined for collector {0:?}")]
    NoMetrics(String),

    #[error("unresolved query_ref {query_ref:?} in metric {metric:?} of collector {collector:?}")]
    UnresolvedQueryRef {
        query_ref: String,
        metric: String,
        collector: String,
    },

    #[error("missing name for query")]
    MissingQueryName,

    #[error("missing query literal for query {0:?}")]
    MissingQueryLiteral(String),

    #[error("missing name for metric")]
    MissingMetricName,

    #[error("missing type for metric {0:?}")]
    MissingMetricType(String),

    #[error("missing help for metric {0:?}")]
    MissingMetricHelp(String),

    #[error("unsupported metric type: {0}")]
    UnsupportedMetricType(String),

    #[error("exactly one of query and query_ref must be specified for metric {0:?}")]
    AmbiguousMetricQuery(String),

    #[error("empty label defined in {0}")]
    EmptyLabel(String),

    #[error("reserved label {label:?} redefined in {ctx}")]
    ReservedLabel { label: String, ctx: String },

    #[error("duplicate key label {label:?} for metric {metric:?}")]
    DuplicateKeyLabel { label: String, metric: String },

    #[error("duplicate label {label:?} (defined in both key_labels and value_label) for metric {metric:?}")]
    KeyLabelShadowsValueLabel { label: String, metric: String },

    #[error("no values defined for metric {0:?}")]
    NoValues(String),

    #[error("metric {0:?} cannot have both static_value and values defined")]
    StaticValueWithValues(String),

    #[error("value_label must be defined for metric with multiple values {0:?}")]
    MissingValueLabel(String),

    #[error("column {column:?} used both as key and value in {ctx}")]
    ColumnTypeConflict { column: String, ctx: String },

    #[error("missing data_source_name for target {0:?}")]
    MissingTargetDsn(String),

    #[error("missing name for job")]
    MissingJobName,

    #[error("no targets defined for job {0:?}")]
    NoTargets(String),

    #[error("empty target name in static config of job {0:?}")]
    EmptyStaticTargetName(String),

    #[error("duplicate target name {target:?} in static_config of job {job:?}")]
    DuplicateStaticTargetName { target: String, job: String },

    #[error("empty data source name for target {target:?} in job {job:?}")]
    EmptyStaticDsn { target: String, job: String },

    #[error("duplicate data source name for target {target:?} in static_config of job {job:?}")]
    DuplicateStaticDsn { target: String, job: String },

    #[error("duplicate label {0:?}")]
    DuplicateConstLabel(String),

    #[error("changing scrape mode is not allowed, please restart the exporter")]
    ScrapeModeChanged,

    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path:?}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("error resolving collector files for {pattern:?}: {source}")]
    BadCollectorFileGlob {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("missing driver in data source name, expected format `<driver>://<dsn>`")]
    MissingDsnScheme,

    #[error("unsupported database scheme {0:?}")]
    UnsupportedScheme(String),
}

/// Context labels attached to a runtime error, matching the
/// `job=...,target=...,collector=...,query=...` log-context string the
/// original threads through every layer, used both for log lines and to
/// populate `scrape_errors_total`'s labels.
#[derive(Clone, Debug, Default)]
pub struct LogContext {
    pub job: Option<String>,
    pub target: Option<String>,
    pub collector: Option<String>,
    pub query: Option<String>,
}

impl LogContext {
    #[must_use]
    pub fn with_job(&self, job: impl Into<String>) -> Self {
        Self {
            job: Some(job.into()),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_target(&self, target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_collector(&self, collector: impl Into<String>) -> Self {
        Self {
            collector: Some(collector.into()),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_query(&self, query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..self.clone()
        }
    }

    /// Labels in the fixed order used by `scrape_errors_total{job,target,collector,query}`.
    #[must_use]
    pub fn label_values(&self) -> [String; 4] {
        [
            self.job.clone().unwrap_or_default(),
            self.target.clone().unwrap_or_default(),
            self.collector.clone().unwrap_or_default(),
            self.query.clone().unwrap_or_default(),
        ]
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(4);
        if let Some(job) = &self.job {
            parts.push(format!("job={job}"));
        }
        if let Some(target) = &self.target {
            parts.push(format!("target={target}"));
        }
        if let Some(collector) = &self.collector {
            parts.push(format!("collector={collector}"));
        }
        if let Some(query) = &self.query {
            parts.push(format!("query={query}"));
        }
        write!(f, "{}", parts.join(","))
    }
}

/// A scrape-time error (connection, query, projection, or deadline),
/// carrying the log context it occurred in. This is what a
/// [`crate::sample::Metric::Invalid`] wraps; kept cheaply `Clone`-able so the
/// caching collector can replay it from its cache without re-running the query.
#[derive(Clone, Debug)]
pub struct ScrapeError {
    pub context: LogContext,
    pub message: Arc<str>,
}

impl ScrapeError {
    pub fn new(context: LogContext, message: impl Into<Arc<str>>) -> Self {
        Self {
            context,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.job.is_none()
            && self.context.target.is_none()
            && self.context.collector.is_none()
            && self.context.query.is_none()
        {
            write!(f, "{}", self.message)
        } else {
            write!(f, "[{}] {}", self.context, self.message)
        }
    }
}

impl std::error::Error for ScrapeError {}
