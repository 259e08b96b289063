//! A Prometheus metric family definition and its row-projection rules.

use crate::errors::ConfigError;
use crate::sample::MetricValueType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricConfig {
    #[serde(rename = "metric_name")]
    pub name: String,
    #[serde(rename = "type")]
    pub type_string: String,
    pub help: String,
    #[serde(default, rename = "key_labels")]
    pub key_labels: Vec<String>,
    #[serde(default, rename = "static_labels")]
    pub static_labels: HashMap<String, String>,
    #[serde(default, rename = "value_label")]
    pub value_label: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default, rename = "query")]
    pub query_literal: Option<String>,
    #[serde(default, rename = "query_ref")]
    pub query_ref: Option<String>,
    #[serde(default, rename = "no_prepared_statement")]
    pub no_prepared_statement: bool,
    #[serde(default, rename = "static_value")]
    pub static_value: Option<f64>,
    #[serde(default, rename = "timestamp_value")]
    pub timestamp_value: Option<String>,
}

impl MetricConfig {
    pub fn value_type(&self) -> Result<MetricValueType, ConfigError> {
        match self.type_string.to_lowercase().as_str() {
            "counter" => Ok(MetricValueType::Counter),
            "gauge" => Ok(MetricValueType::Gauge),
            _ => Err(ConfigError::UnsupportedMetricType(self.type_string.clone())),
        }
    }

    pub fn validate(&self, target_label: &str) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingMetricName);
        }
        if self.type_string.is_empty() {
            return Err(ConfigError::MissingMetricType(self.name.clone()));
        }
        if self.help.is_empty() {
            return Err(ConfigError::MissingMetricHelp(self.name.clone()));
        }
        if self.query_literal.is_none() == self.query_ref.is_none() {
            return Err(ConfigError::AmbiguousMetricQuery(self.name.clone()));
        }
        self.value_type()?;
        self.validate_key_labels(target_label)?;
        self.validate_values(target_label)?;
        Ok(())
    }

    fn validate_key_labels(&self, target_label: &str) -> Result<(), ConfigError> {
        for (i, li) in self.key_labels.iter().enumerate() {
            super::util::check_label(li, target_label, &format!("metric {:?}", self.name))?;
            for lj in &self.key_labels[i + 1..] {
                if li == lj {
                    return Err(ConfigError::DuplicateKeyLabel {
                        label: li.clone(),
                        metric: self.name.clone(),
                    });
                }
            }
            if self.value_label.as_deref() == Some(li.as_str()) {
                return Err(ConfigError::KeyLabelShadowsValueLabel {
                    label: li.clone(),
                    metric: self.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_values(&self, target_label: &str) -> Result<(), ConfigError> {
        if self.values.is_empty() && self.static_value.is_none() {
            return Err(ConfigError::NoValues(self.name.clone()));
        }
        if !self.values.is_empty() && self.static_value.is_some() {
            return Err(ConfigError::StaticValueWithValues(self.name.clone()));
        }
        if self.values.len() > 1 {
            match &self.value_label {
                None => return Err(ConfigError::MissingValueLabel(self.name.clone())),
                Some(vl) => super::util::check_label(
                    vl,
                    target_label,
                    &format!("value_label for metric {:?}", self.name),
                )?,
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn default_for_test() -> Self {
        Self {
            name: "m".to_string(),
            type_string: "gauge".to_string(),
            help: "h".to_string(),
            key_labels: vec![],
            static_labels: HashMap::new(),
            value_label: None,
            values: vec!["v".to_string()],
            query_literal: Some("select 1 as v".to_string()),
            query_ref: None,
            no_prepared_statement: false,
            static_value: None,
            timestamp_value: None,
        }
    }
}
