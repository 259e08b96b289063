//! Hot-swapping the live configuration without dropping open connections.
//! A configuration change that would flip scrape mode - single target to
//! jobs, or jobs to single target - is refused symmetrically in both
//! directions, matching the documented contract that changing scrape mode
//! is not allowed.

use crate::config::{Config, JobConfig, ResolvedConfig};
use crate::db::{handle_key, HandleReuseMap};
use crate::errors::{ConfigError, LogContext};
use crate::job;
use crate::target::Target;
use anyhow::Result;
use std::path::Path;

/// Loads `config_path`, merges it against `current` per the transition rules,
/// and builds the resulting runtime targets - reusing `current_targets`'
/// handles wherever a target's `(job, name, dsn)` identity is unchanged.
///
/// On any failure the caller's existing config and targets are left
/// untouched, matching "leave the live config untouched and return the
/// error" from the reload procedure.
pub async fn reload(
    config_path: &Path,
    current: &ResolvedConfig,
    current_targets: &[Target],
    target_label: &str,
    default_enable_ping: bool,
) -> Result<(ResolvedConfig, Vec<Target>)> {
    let next = Config::load_with_target_label(config_path, target_label)?;
    let merged = merge_for_reload(current, next)?;

    let mut reuse = HandleReuseMap::new();
    for t in current_targets {
        reuse.insert(t.reuse_key(), t.handle());
    }

    let targets = build_targets(&merged, &reuse, target_label, default_enable_ping).await?;
    Ok((merged, targets))
}

/// Applies the scrape-mode transition rules to produce the merged
/// configuration that will be rebuilt into targets.
fn merge_for_reload(current: &ResolvedConfig, next: ResolvedConfig) -> Result<ResolvedConfig, ConfigError> {
    match (&current.target, next.target) {
        (Some((current_target, _)), Some((mut next_target, next_collectors))) => {
            // Preserve the current DSN (connection identity); adopt everything else from `next`.
            next_target.dsn = current_target.dsn.clone();
            Ok(ResolvedConfig {
                globals: next.globals,
                target: Some((next_target, next_collectors)),
                jobs: Vec::new(),
            })
        }
        (None, None) => Ok(ResolvedConfig {
            globals: next.globals,
            target: None,
            jobs: merge_jobs(&current.jobs, next.jobs),
        }),
        _ => Err(ConfigError::ScrapeModeChanged),
    }
}

/// For every job with a name already present in `current`, carries its
/// `static_configs` forward (preserving target identities) onto the
/// corresponding job in `next`; jobs new to this generation use `next`'s
/// static_configs as-is.
fn merge_jobs(
    current: &[(JobConfig, Vec<crate::config::CollectorConfig>)],
    next: Vec<(JobConfig, Vec<crate::config::CollectorConfig>)>,
) -> Vec<(JobConfig, Vec<crate::config::CollectorConfig>)> {
    next.into_iter()
        .map(|(mut jc, collectors)| {
            if let Some((current_jc, _)) = current.iter().find(|(c, _)| c.name == jc.name) {
                jc.static_configs = current_jc.static_configs.clone();
            }
            (jc, collectors)
        })
        .collect()
}

/// Builds the full runtime target list from a resolved config, reusing
/// `reuse`'s handles for any target whose identity is found there. Also used
/// for the initial (non-reload) startup, with an empty `reuse` map.
pub async fn build_targets(
    resolved: &ResolvedConfig,
    reuse: &HandleReuseMap,
    target_label: &str,
    default_enable_ping: bool,
) -> Result<Vec<Target>> {
    let mut targets = Vec::new();

    if let Some((target_config, collectors)) = &resolved.target {
        let enable_ping = target_config.enable_ping.unwrap_or(default_enable_ping);
        let dsn = target_config.dsn.expose();
        let key = handle_key("", &target_config.name, dsn);

        let target = if let Some(handle) = reuse.get(&key) {
            Target::with_handle(
                LogContext::default(),
                target_config.name.clone(),
                dsn,
                handle.clone(),
                collectors,
                &[],
                enable_ping,
            )?
        } else {
            Target::new(
                LogContext::default(),
                target_config.name.clone(),
                dsn,
                collectors,
                &[],
                &resolved.globals,
                enable_ping,
            )
            .await?
        };
        targets.push(target);
    }

    for (jc, collectors) in &resolved.jobs {
        let built = job::build_job_targets(
            &LogContext::default(),
            jc,
            collectors,
            &resolved.globals,
            reuse,
            target_label,
            default_enable_ping,
        )
        .await?;
        targets.extend(built);
    }

    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CollectorConfig, MetricConfig, Secret, StaticConfig, TargetConfig};
    use std::collections::HashMap;

    fn target_config(dsn: &str) -> (TargetConfig, Vec<CollectorConfig>) {
        (
            TargetConfig {
                name: "t".to_string(),
                dsn: Secret::new(dsn),
                aws_secret_name: None,
                collector_refs: vec!["c".to_string()],
                enable_ping: None,
            },
            vec![CollectorConfig {
                name: "c".to_string(),
                min_interval: None,
                metrics: vec![MetricConfig::default_for_test()],
                queries: vec![],
            }],
        )
    }

    #[test]
    fn target_to_target_preserves_the_old_dsn() {
        let current = ResolvedConfig {
            globals: crate::config::GlobalConfig::default(),
            target: Some(target_config("sqlite://old.db")),
            jobs: Vec::new(),
        };
        let next = ResolvedConfig {
            globals: crate::config::GlobalConfig::default(),
            target: Some(target_config("sqlite://new.db")),
            jobs: Vec::new(),
        };

        let merged = merge_for_reload(&current, next).unwrap();
        let (t, _) = merged.target.expect("target mode");
        assert_eq!(t.dsn.expose(), "sqlite://old.db");
    }

    #[test]
    fn jobs_to_target_is_refused() {
        let current = ResolvedConfig {
            globals: crate::config::GlobalConfig::default(),
            target: None,
            jobs: vec![(
                JobConfig {
                    name: "j".to_string(),
                    collector_refs: vec!["c".to_string()],
                    static_configs: vec![],
                    enable_ping: None,
                },
                vec![],
            )],
        };
        let next = ResolvedConfig {
            globals: crate::config::GlobalConfig::default(),
            target: Some(target_config("sqlite://new.db")),
            jobs: Vec::new(),
        };

        assert!(matches!(
            merge_for_reload(&current, next),
            Err(ConfigError::ScrapeModeChanged)
        ));
    }

    #[test]
    fn target_to_jobs_is_also_refused() {
        let current = ResolvedConfig {
            globals: crate::config::GlobalConfig::default(),
            target: Some(target_config("sqlite://old.db")),
            jobs: Vec::new(),
        };
        let next = ResolvedConfig {
            globals: crate::config::GlobalConfig::default(),
            target: None,
            jobs: vec![(
                JobConfig {
                    name: "j".to_string(),
                    collector_refs: vec!["c".to_string()],
                    static_configs: vec![],
                    enable_ping: None,
                },
                vec![],
            )],
        };

        assert!(matches!(
            merge_for_reload(&current, next),
            Err(ConfigError::ScrapeModeChanged)
        ));
    }

    #[test]
    fn matching_job_keeps_its_previous_static_configs() {
        let mut old_targets = HashMap::new();
        old_targets.insert("t1".to_string(), Secret::new("sqlite://old.db"));
        let current_jobs = vec![(
            JobConfig {
                name: "j".to_string(),
                collector_refs: vec!["c".to_string()],
                static_configs: vec![StaticConfig {
                    targets: old_targets,
                    labels: HashMap::new(),
                }],
                enable_ping: None,
            },
            vec![],
        )];

        let mut new_targets = HashMap::new();
        new_targets.insert("t1".to_string(), Secret::new("sqlite://attempted-new.db"));
        let next_jobs = vec![(
            JobConfig {
                name: "j".to_string(),
                collector_refs: vec!["c".to_string()],
                static_configs: vec![StaticConfig {
                    targets: new_targets,
                    labels: HashMap::new(),
                }],
                enable_ping: None,
            },
            vec![],
        )];

        let merged = merge_jobs(&current_jobs, next_jobs);
        let (merged_job, _) = merged.first().unwrap();
        let dsn = merged_job.static_configs.first().unwrap().targets.get("t1").unwrap();
        assert_eq!(dsn.expose(), "sqlite://old.db");
    }
}
