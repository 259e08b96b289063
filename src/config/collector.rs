//! A named group of queries and metrics, shareable across targets/jobs by
//! reference.

use crate::config::duration::ConfigDuration;
use crate::config::metric::MetricConfig;
use crate::config::query::QueryConfig;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorConfig {
    #[serde(rename = "collector_name")]
    pub name: String,
    #[serde(default, rename = "min_interval")]
    pub min_interval: Option<ConfigDuration>,
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
    #[serde(default)]
    pub queries: Vec<QueryConfig>,
}

impl CollectorConfig {
    pub fn validate(&self, target_label: &str) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingCollectorName);
        }
        if self.metrics.is_empty() {
            return Err(ConfigError::NoMetrics(self.name.clone()));
        }
        for q in &self.queries {
            q.validate()?;
        }
        for (i, qi) in self.queries.iter().enumerate() {
            for qj in &self.queries[i + 1..] {
                if qi.name == qj.name {
                    return Err(ConfigError::DuplicateQueryName(qi.name.clone()));
                }
            }
        }

        let named: HashMap<&str, &QueryConfig> =
            self.queries.iter().map(|q| (q.name.as_str(), q)).collect();
        for m in &self.metrics {
            m.validate(target_label)?;
            if let Some(q_ref) = &m.query_ref {
                if !named.contains_key(q_ref.as_str()) {
                    return Err(ConfigError::UnresolvedQueryRef {
                        query_ref: q_ref.clone(),
                        metric: m.name.clone(),
                        collector: self.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Groups this collector's metrics by the query that feeds them, giving
    /// each distinct `query_ref`/inline `query` its own query-text bucket,
    /// without needing a mutable back-reference field on the metric itself.
    #[must_use]
    pub fn grouped_queries(&self) -> Vec<(QueryConfig, Vec<MetricConfig>)> {
        let named: HashMap<&str, &QueryConfig> =
            self.queries.iter().map(|q| (q.name.as_str(), q)).collect();

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, (QueryConfig, Vec<MetricConfig>)> = HashMap::new();

        for m in &self.metrics {
            let q = if let Some(q_ref) = &m.query_ref {
                match named.get(q_ref.as_str()) {
                    Some(q) => (*q).clone(),
                    None => continue,
                }
            } else if let Some(literal) = &m.query_literal {
                QueryConfig {
                    name: m.name.clone(),
                    query: literal.clone(),
                    no_prepared_statement: m.no_prepared_statement,
                }
            } else {
                continue;
            };
            let key = q.name.clone();
            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key.clone());
                    (q, Vec::new())
                })
                .1
                .push(m.clone());
        }

        order
            .into_iter()
            .filter_map(|k| groups.remove(&k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CollectorConfig {
        CollectorConfig {
            name: "c".to_string(),
            min_interval: None,
            metrics: vec![MetricConfig::default_for_test()],
            queries: vec![],
        }
    }

    #[test]
    fn requires_at_least_one_metric() {
        let mut c = base();
        c.metrics.clear();
        assert!(matches!(
            c.validate("target"),
            Err(ConfigError::NoMetrics(_))
        ));
    }

    #[test]
    fn unresolved_query_ref_is_rejected() {
        let mut c = base();
        c.metrics[0].query_literal = None;
        c.metrics[0].query_ref = Some("missing".to_string());
        assert!(matches!(
            c.validate("target"),
            Err(ConfigError::UnresolvedQueryRef { .. })
        ));
    }

    #[test]
    fn grouped_queries_buckets_inline_literal_metrics_together() {
        let mut c = base();
        let mut m2 = MetricConfig::default_for_test();
        m2.name = "m2".to_string();
        c.metrics.push(m2);
        let groups = c.grouped_queries();
        assert_eq!(groups.len(), 2);
    }
}
