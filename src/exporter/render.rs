//! Renders collected [`SampleMetric`]s as Prometheus text exposition format.
//! Each scrape's metric families carry const labels (job/target identity)
//! that differ target to target, so they can't be registered once against a
//! fixed `prometheus::Desc` the way [`crate::internal_metrics`] registers
//! its fixed self-metrics - this encoder is hand-rolled instead of reusing
//! `prometheus::TextEncoder`, which only knows how to walk a `Registry` of
//! already-registered collectors. The wire format follows what
//! `prometheus::TextEncoder` itself produces (`# HELP`, `# TYPE`,
//! `name{labels} value timestamp`).

use crate::sample::{MetricValueType, SampleMetric};
use std::fmt::Write as _;

/// Renders every sample, grouped by metric name in first-seen order, with one
/// `# HELP`/`# TYPE` pair per group.
#[must_use]
pub fn render_text(samples: &[SampleMetric]) -> String {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: std::collections::HashMap<&str, Vec<&SampleMetric>> = std::collections::HashMap::new();

    for sample in samples {
        let name = sample.desc.name.as_ref();
        groups.entry(name).or_insert_with(|| {
            order.push(name);
            Vec::new()
        }).push(sample);
    }

    let mut out = String::new();
    for name in order {
        let Some(group) = groups.get(name) else { continue };
        let Some(first) = group.first() else { continue };

        let type_name = match first.desc.value_type {
            MetricValueType::Counter => "counter",
            MetricValueType::Gauge => "gauge",
        };
        let _ = writeln!(out, "# HELP {name} {}", escape_help(&first.desc.help));
        let _ = writeln!(out, "# TYPE {name} {type_name}");

        for sample in group {
            write_sample(&mut out, name, sample);
        }
    }
    out
}

fn write_sample(out: &mut String, name: &str, sample: &SampleMetric) {
    let desc = &sample.desc;
    let has_labels = !desc.const_labels.is_empty() || !desc.variable_label_names.is_empty();

    let _ = write!(out, "{name}");
    if has_labels {
        out.push('{');
        let mut first = true;
        for (label, value) in desc.const_labels.iter() {
            if !first {
                out.push(',');
            }
            first = false;
            let _ = write!(out, "{label}=\"{}\"", escape_label_value(value));
        }
        for (label, value) in desc.variable_label_names.iter().zip(sample.label_values.iter()) {
            if !first {
                out.push(',');
            }
            first = false;
            let _ = write!(out, "{label}=\"{}\"", escape_label_value(value));
        }
        out.push('}');
    }

    let _ = write!(out, " {}", format_value(sample.value));
    if let Some(ts) = sample.timestamp {
        let _ = write!(out, " {}", ts.timestamp_millis());
    }
    out.push('\n');
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "+Inf".to_string() } else { "-Inf".to_string() }
    } else {
        v.to_string()
    }
}

fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::MetricDesc;
    use std::sync::Arc;

    fn sample(value: f64, label_values: Vec<String>) -> SampleMetric {
        SampleMetric {
            desc: Arc::new(MetricDesc {
                name: Arc::from("widgets_total"),
                help: Arc::from("Total widgets"),
                value_type: MetricValueType::Counter,
                const_labels: Arc::from(vec![("job".to_string(), "j".to_string())]),
                variable_label_names: Arc::from(vec!["color".to_string()]),
            }),
            label_values,
            value,
            timestamp: None,
        }
    }

    #[test]
    fn renders_help_and_type_once_per_family() {
        let samples = vec![
            sample(1.0, vec!["red".to_string()]),
            sample(2.0, vec!["blue".to_string()]),
        ];
        let text = render_text(&samples);
        assert_eq!(text.matches("# HELP widgets_total").count(), 1);
        assert_eq!(text.matches("# TYPE widgets_total counter").count(), 1);
        assert!(text.contains(r#"widgets_total{job="j",color="red"} 1"#));
        assert!(text.contains(r#"widgets_total{job="j",color="blue"} 2"#));
    }

    #[test]
    fn escapes_quotes_and_backslashes_in_label_values() {
        let samples = vec![sample(1.0, vec!["a\"b\\c".to_string()])];
        let text = render_text(&samples);
        assert!(text.contains(r#"color="a\"b\\c""#));
    }
}
