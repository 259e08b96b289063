//! Runs one SQL statement and projects its result rows into samples for one
//! or more metric families.

use crate::config::QueryConfig;
use crate::db::Handle;
use crate::errors::{ConfigError, LogContext, ScrapeError};
use crate::metric_family::MetricFamily;
use crate::model::{CellValue, ColumnType, Row};
use crate::sample::Metric;
use chrono::{DateTime, Utc};
use sqlx::{Column, Row as _};
use std::collections::HashMap;
use std::time::Duration;

pub struct Query {
    pub name: String,
    sql: String,
    no_prepared_statement: bool,
    column_types: HashMap<String, ColumnType>,
    families: Vec<MetricFamily>,
    log_context: LogContext,
}

impl Query {
    pub fn new(
        log_context: LogContext,
        qc: &QueryConfig,
        families: Vec<MetricFamily>,
    ) -> Result<Self, ConfigError> {
        let log_context = log_context.with_query(qc.name.clone());
        let mut column_types: HashMap<String, ColumnType> = HashMap::new();

        for family in &families {
            for key in family.key_label_columns() {
                set_column_type(&log_context, key, ColumnType::Key, &mut column_types)?;
            }
            for value in family.value_columns() {
                set_column_type(&log_context, value, ColumnType::Value, &mut column_types)?;
            }
            if let Some(ts) = family.timestamp_column() {
                set_column_type(&log_context, ts, ColumnType::Time, &mut column_types)?;
            }
        }

        Ok(Self {
            name: qc.name.clone(),
            sql: qc.query.clone(),
            no_prepared_statement: qc.no_prepared_statement,
            column_types,
            families,
            log_context,
        })
    }

    /// Runs the query against `handle`, returning the projected samples from
    /// every metric family it feeds. `timeout` of `None` means the query
    /// runs to completion with no deadline. Emits one invalid-metric
    /// sentinel per failure instead of aborting the whole scrape.
    pub async fn collect(
        &self,
        handle: &Handle,
        timeout: Option<Duration>,
        ignore_missing_vals: bool,
    ) -> Vec<Metric> {
        let rows = if self.no_prepared_statement {
            sqlx::query(&self.sql).fetch_all(&handle.pool)
        } else {
            sqlx::query(&self.sql).persistent(true).fetch_all(&handle.pool)
        };

        let rows = match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rows).await {
                Ok(Ok(rows)) => rows,
                Ok(Err(source)) => {
                    return vec![Metric::invalid(ScrapeError::new(
                        self.log_context.clone(),
                        format!("query failed: {source}"),
                    ))];
                }
                Err(_) => {
                    return vec![Metric::invalid(ScrapeError::new(
                        self.log_context.clone(),
                        "query exceeded the scrape deadline".to_string(),
                    ))];
                }
            },
            None => match rows.await {
                Ok(rows) => rows,
                Err(source) => {
                    return vec![Metric::invalid(ScrapeError::new(
                        self.log_context.clone(),
                        format!("query failed: {source}"),
                    ))];
                }
            },
        };

        let mut out = Vec::new();
        for any_row in &rows {
            match self.project_row(any_row) {
                Ok(Some(row)) => {
                    for family in &self.families {
                        out.extend(family.collect(&row));
                    }
                }
                Ok(None) => {}
                Err(message) => {
                    if ignore_missing_vals {
                        continue;
                    }
                    out.push(Metric::invalid(ScrapeError::new(
                        self.log_context.clone(),
                        message,
                    )));
                }
            }
        }
        out
    }

    /// Scans one row into a [`Row`], checking every column this query's
    /// families need was actually returned. `sqlx::any::AnyRow` lets us look
    /// columns up by name without a separate destination buffer.
    fn project_row(&self, any_row: &sqlx::any::AnyRow) -> Result<Option<Row>, String> {
        let present: std::collections::HashSet<&str> =
            any_row.columns().iter().map(sqlx::Column::name).collect();

        let missing: Vec<&str> = self
            .column_types
            .keys()
            .map(String::as_str)
            .filter(|c| !present.contains(c))
            .collect();
        if !missing.is_empty() {
            return Err(format!(
                "missing values for the requested columns: {missing:?}"
            ));
        }

        let mut row = Row::new();
        for (column, ctype) in &self.column_types {
            let cell = match ctype {
                ColumnType::Key => CellValue::Str(
                    any_row
                        .try_get::<Option<String>, _>(column.as_str())
                        .map_err(|e| format!("scanning column {column:?}: {e}"))?,
                ),
                ColumnType::Value => CellValue::Float(
                    any_row
                        .try_get::<Option<f64>, _>(column.as_str())
                        .map_err(|e| format!("scanning column {column:?}: {e}"))?,
                ),
                ColumnType::Time => CellValue::Time(
                    any_row
                        .try_get::<Option<DateTime<Utc>>, _>(column.as_str())
                        .map_err(|e| format!("scanning column {column:?}: {e}"))?,
                ),
            };
            row.insert(column.clone(), cell);
        }
        Ok(Some(row))
    }
}

fn set_column_type(
    log_context: &LogContext,
    column: &str,
    ctype: ColumnType,
    column_types: &mut HashMap<String, ColumnType>,
) -> Result<(), ConfigError> {
    match column_types.get(column) {
        Some(existing) if *existing != ctype => Err(ConfigError::ColumnTypeConflict {
            column: column.to_string(),
            ctx: log_context.to_string(),
        }),
        Some(_) => Ok(()),
        None => {
            column_types.insert(column.to_string(), ctype);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricConfig;

    fn family(mc: MetricConfig) -> MetricFamily {
        MetricFamily::new(&LogContext::default(), &mc, &[]).unwrap()
    }

    #[test]
    fn detects_a_column_used_as_both_key_and_value() {
        let mut key_mc = MetricConfig::default_for_test();
        key_mc.key_labels = vec!["v".to_string()];
        let families = vec![family(key_mc)];

        let qc = QueryConfig {
            name: "q".to_string(),
            query: "select 1 as v".to_string(),
            no_prepared_statement: false,
        };
        let err = Query::new(LogContext::default(), &qc, families).unwrap_err();
        assert!(matches!(err, ConfigError::ColumnTypeConflict { .. }));
    }

    #[test]
    fn agrees_on_shared_value_columns_across_families() {
        let families = vec![family(MetricConfig::default_for_test()), family(MetricConfig::default_for_test())];
        let qc = QueryConfig {
            name: "q".to_string(),
            query: "select 1 as v".to_string(),
            no_prepared_statement: false,
        };
        assert!(Query::new(LogContext::default(), &qc, families).is_ok());
    }
}
