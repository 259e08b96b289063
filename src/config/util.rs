//! Small validation helpers shared across config blocks: collector-reference
//! resolution by shell glob, and reserved-label checks.

use crate::errors::ConfigError;
use std::collections::HashMap;

use super::collector::CollectorConfig;

pub fn check_collector_refs(refs: &[String], ctx: &str) -> Result<(), ConfigError> {
    if refs.is_empty() {
        return Err(ConfigError::NoCollectors(ctx.to_string()));
    }
    for (i, ci) in refs.iter().enumerate() {
        for cj in &refs[i + 1..] {
            if ci == cj {
                return Err(ConfigError::DuplicateCollectorRef {
                    reference: ci.clone(),
                    ctx: ctx.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Resolves each shell-style glob reference against the collectors map.
/// Matches contributed by more than one reference are only included once.
/// The order collectors are contributed in is deliberately unspecified
/// (iteration order of the backing map).
pub fn resolve_collector_refs(
    refs: &[String],
    collectors: &HashMap<String, CollectorConfig>,
    ctx: &str,
) -> Result<Vec<CollectorConfig>, ConfigError> {
    let mut resolved = Vec::with_capacity(refs.len());
    let mut seen = std::collections::HashSet::new();

    for cref in refs {
        let pattern = glob::Pattern::new(cref).map_err(|source| ConfigError::BadCollectorGlob {
            reference: cref.clone(),
            ctx: ctx.to_string(),
            source,
        })?;
        let mut matched_any = false;
        for (name, coll) in collectors {
            if pattern.matches(name) {
                matched_any = true;
                if seen.insert(name.clone()) {
                    resolved.push(coll.clone());
                }
            }
        }
        if !matched_any {
            return Err(ConfigError::UnresolvedCollectorRef {
                reference: cref.clone(),
                ctx: ctx.to_string(),
            });
        }
    }
    Ok(resolved)
}

pub fn check_label(label: &str, target_label: &str, ctx: &str) -> Result<(), ConfigError> {
    if label.is_empty() {
        return Err(ConfigError::EmptyLabel(ctx.to_string()));
    }
    if label == "job" || label == target_label {
        return Err(ConfigError::ReservedLabel {
            label: label.to_string(),
            ctx: ctx.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::collector::CollectorConfig;
    use crate::config::metric::MetricConfig;

    fn coll(name: &str) -> CollectorConfig {
        CollectorConfig {
            name: name.to_string(),
            min_interval: None,
            metrics: vec![MetricConfig::default_for_test()],
            queries: vec![],
        }
    }

    #[test]
    fn glob_matches_multiple_collectors_without_duplicates() {
        let mut map = HashMap::new();
        map.insert("a1".to_string(), coll("a1"));
        map.insert("a2".to_string(), coll("a2"));
        map.insert("b1".to_string(), coll("b1"));

        let resolved = resolve_collector_refs(
            &["a*".to_string(), "a1".to_string()],
            &map,
            "target",
        )
        .unwrap();
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn unmatched_glob_is_an_error() {
        let map = HashMap::new();
        let err = resolve_collector_refs(&["nope".to_string()], &map, "target").unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedCollectorRef { .. }));
    }

    #[test]
    fn duplicate_refs_rejected() {
        let err = check_collector_refs(&["a".to_string(), "a".to_string()], "target").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateCollectorRef { .. }));
    }

    #[test]
    fn reserved_labels_rejected() {
        assert!(check_label("job", "target", "metric").is_err());
        assert!(check_label("target", "target", "metric").is_err());
        assert!(check_label("region", "target", "metric").is_ok());
    }
}
