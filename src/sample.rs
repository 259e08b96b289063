//! The in-flight sample representation produced by [`crate::metric_family`]
//! and consumed by [`crate::exporter`]'s aggregator. Equivalent to the
//! original's `Metric` interface (a `prometheus.Metric` plus an
//! "invalid metric" sentinel carrying an error).

use crate::errors::ScrapeError;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricValueType {
    Counter,
    Gauge,
}

/// Everything about a metric family that is fixed at collector-construction
/// time: its name, help text, type, constant labels (job/target/static
/// labels) and the names of the labels that vary per sample (key_labels, plus
/// value_label when a metric has more than one value column).
#[derive(Clone, Debug)]
pub struct MetricDesc {
    pub name: Arc<str>,
    pub help: Arc<str>,
    pub value_type: MetricValueType,
    /// Sorted, deduplicated (name, value) pairs - job/target identity plus static_labels.
    pub const_labels: Arc<[(String, String)]>,
    pub variable_label_names: Arc<[String]>,
}

#[derive(Clone, Debug)]
pub struct SampleMetric {
    pub desc: Arc<MetricDesc>,
    /// Values aligned 1:1 with `desc.variable_label_names`.
    pub label_values: Vec<String>,
    pub value: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub enum Metric {
    Sample(SampleMetric),
    Invalid(ScrapeError),
}

impl Metric {
    #[must_use]
    pub fn invalid(err: ScrapeError) -> Self {
        Metric::Invalid(err)
    }
}
