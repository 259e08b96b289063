//! Turns one scanned row into zero or more samples for a single metric
//! family. A NULL key column renders as an empty label value; a NULL value
//! column is skipped rather than emitted as zero.

use crate::config::MetricConfig;
use crate::errors::{ConfigError, LogContext};
use crate::model::{CellValue, Row};
use crate::sample::{Metric, MetricDesc, MetricValueType, SampleMetric};
use std::sync::Arc;

#[derive(Clone)]
pub struct MetricFamily {
    desc: Arc<MetricDesc>,
    key_labels: Vec<String>,
    values: Vec<String>,
    value_label: Option<String>,
    static_value: Option<f64>,
    timestamp_value: Option<String>,
}

impl MetricFamily {
    pub fn new(
        log_context: &LogContext,
        mc: &MetricConfig,
        const_labels: &[(String, String)],
    ) -> Result<Self, ConfigError> {
        mc.validate(log_context.target.as_deref().unwrap_or("instance"))?;

        let value_type = match mc.value_type()? {
            MetricValueType::Counter => MetricValueType::Counter,
            MetricValueType::Gauge => MetricValueType::Gauge,
        };

        let mut const_labels: Vec<(String, String)> = const_labels.to_vec();
        const_labels.extend(mc.static_labels.clone());
        const_labels.sort();
        const_labels.dedup_by(|a, b| a.0 == b.0);

        let mut variable_label_names = mc.key_labels.clone();
        if mc.values.len() > 1 {
            if let Some(vl) = &mc.value_label {
                variable_label_names.push(vl.clone());
            }
        }

        let desc = Arc::new(MetricDesc {
            name: Arc::from(mc.name.as_str()),
            help: Arc::from(mc.help.as_str()),
            value_type,
            const_labels: Arc::from(const_labels),
            variable_label_names: Arc::from(variable_label_names),
        });

        Ok(Self {
            desc,
            key_labels: mc.key_labels.clone(),
            values: mc.values.clone(),
            value_label: mc.value_label.clone(),
            static_value: mc.static_value,
            timestamp_value: mc.timestamp_value.clone(),
        })
    }

    #[must_use]
    pub fn key_label_columns(&self) -> &[String] {
        &self.key_labels
    }

    #[must_use]
    pub fn value_columns(&self) -> &[String] {
        &self.values
    }

    #[must_use]
    pub fn timestamp_column(&self) -> Option<&str> {
        self.timestamp_value.as_deref()
    }

    /// Projects one scanned row into this family's samples. A row can
    /// produce more than one sample when `values` names several columns
    /// (each paired with `value_label`'s column name); it produces none
    /// when every value column is NULL.
    #[must_use]
    pub fn collect(&self, row: &Row) -> Vec<Metric> {
        let key_values: Vec<String> = self
            .key_labels
            .iter()
            .map(|col| match row.get(col.as_str()) {
                Some(CellValue::Str(Some(v))) => v.clone(),
                _ => String::new(),
            })
            .collect();

        let timestamp = self.timestamp_value.as_deref().and_then(|col| match row.get(col) {
            Some(CellValue::Time(Some(t))) => Some(*t),
            _ => None,
        });

        if let Some(static_value) = self.static_value {
            return vec![Metric::Sample(SampleMetric {
                desc: self.desc.clone(),
                label_values: key_values,
                value: static_value,
                timestamp,
            })];
        }

        let mut samples = Vec::with_capacity(self.values.len());
        for value_col in &self.values {
            let Some(CellValue::Float(Some(value))) = row.get(value_col.as_str()) else {
                continue;
            };
            let mut label_values = key_values.clone();
            if self.values.len() > 1 && self.value_label.is_some() {
                label_values.push(value_col.clone());
            }
            samples.push(Metric::Sample(SampleMetric {
                desc: self.desc.clone(),
                label_values,
                value: *value,
                timestamp,
            }));
        }
        samples
    }
}
