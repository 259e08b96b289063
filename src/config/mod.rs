//! Top-level configuration: parsing, cross-referencing and validation.

pub mod aws_secrets;
pub mod collector;
pub mod duration;
pub mod env_overlay;
pub mod global;
pub mod job;
pub mod metric;
pub mod query;
pub mod secret;
pub mod target;
pub mod util;

pub use collector::CollectorConfig;
pub use duration::ConfigDuration;
pub use global::GlobalConfig;
pub use job::{JobConfig, StaticConfig};
pub use metric::MetricConfig;
pub use query::QueryConfig;
pub use secret::Secret;
pub use target::TargetConfig;

use crate::errors::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default for `--config.target-label`: the label name that carries a
/// target's name on every sample it produces, alongside `job`.
pub const DEFAULT_TARGET_LABEL: &str = "target";

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, rename = "global")]
    pub globals: GlobalConfig,
    #[serde(default, rename = "collector_files")]
    pub collector_files: Vec<String>,
    #[serde(default)]
    pub target: Option<TargetConfig>,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
    #[serde(default)]
    pub collectors: Vec<CollectorConfig>,

    #[serde(skip)]
    config_file: PathBuf,
}

/// The outcome of [`Config::load`]: a validated config tree plus every
/// target/job's collector references already resolved against
/// `collectors`/`collector_files`, so the runtime layer never has to look
/// collectors up by name again.
#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    pub globals: GlobalConfig,
    pub target: Option<(TargetConfig, Vec<CollectorConfig>)>,
    pub jobs: Vec<(JobConfig, Vec<CollectorConfig>)>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<ResolvedConfig, ConfigError> {
        Self::load_with_target_label(path, DEFAULT_TARGET_LABEL)
    }

    pub fn load_with_target_label(
        path: impl AsRef<Path>,
        target_label: &str,
    ) -> Result<ResolvedConfig, ConfigError> {
        let path = path.as_ref();
        let buf = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut cfg: Config =
            serde_yaml::from_str(&buf).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        cfg.config_file = path.to_path_buf();

        env_overlay::apply_global_overlay(&mut cfg.globals);
        if let Some(target) = &mut cfg.target {
            env_overlay::apply_target_overlay(target);
        }

        cfg.load_collector_files()?;
        cfg.resolve(target_label)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<ResolvedConfig, ConfigError> {
        Self::from_yaml_str_with_target_label(yaml, DEFAULT_TARGET_LABEL)
    }

    pub fn from_yaml_str_with_target_label(
        yaml: &str,
        target_label: &str,
    ) -> Result<ResolvedConfig, ConfigError> {
        let mut cfg: Config = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        env_overlay::apply_global_overlay(&mut cfg.globals);
        if let Some(target) = &mut cfg.target {
            env_overlay::apply_target_overlay(target);
        }
        cfg.load_collector_files()?;
        cfg.resolve(target_label)
    }

    pub fn yaml(resolved: &ResolvedConfig) -> Result<String, ConfigError> {
        #[derive(serde::Serialize)]
        struct View<'a> {
            global: &'a GlobalConfig,
            target: &'a Option<(TargetConfig, Vec<CollectorConfig>)>,
            jobs: &'a [(JobConfig, Vec<CollectorConfig>)],
        }
        serde_yaml::to_string(&View {
            global: &resolved.globals,
            target: &resolved.target,
            jobs: &resolved.jobs,
        })
        .map_err(|source| ConfigError::Parse {
            path: "<config view>".to_string(),
            source,
        })
    }

    fn load_collector_files(&mut self) -> Result<(), ConfigError> {
        let base_dir = self
            .config_file
            .parent()
            .map_or_else(PathBuf::new, Path::to_path_buf);

        for cfglob in self.collector_files.clone() {
            let pattern = if Path::new(&cfglob).is_absolute() {
                cfglob.clone()
            } else {
                base_dir.join(&cfglob).to_string_lossy().into_owned()
            };

            let paths = glob::glob(&pattern).map_err(|source| ConfigError::BadCollectorFileGlob {
                pattern: pattern.clone(),
                source,
            })?;

            for entry in paths {
                let Ok(path) = entry else { continue };
                let buf = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                let coll: CollectorConfig =
                    serde_yaml::from_str(&buf).map_err(|source| ConfigError::Parse {
                        path: path.display().to_string(),
                        source,
                    })?;
                self.collectors.push(coll);
            }
        }
        Ok(())
    }

    fn resolve(mut self, target_label: &str) -> Result<ResolvedConfig, ConfigError> {
        self.globals.validate()?;

        if self.jobs.is_empty() == self.target.is_none() {
            return Err(ConfigError::MissingScrapeMode);
        }

        let mut named: HashMap<String, CollectorConfig> = HashMap::new();
        for mut coll in std::mem::take(&mut self.collectors) {
            if coll.min_interval.is_none() {
                coll.min_interval = Some(self.globals.min_interval);
            }
            coll.validate(target_label)?;
            if named.insert(coll.name.clone(), coll.clone()).is_some() {
                return Err(ConfigError::DuplicateCollectorName(coll.name));
            }
        }

        let target = match self.target {
            Some(t) => {
                t.validate()?;
                let resolved = util::resolve_collector_refs(&t.collector_refs, &named, "target")?;
                Some((t, resolved))
            }
            None => None,
        };

        let mut jobs = Vec::with_capacity(self.jobs.len());
        for j in self.jobs {
            j.validate()?;
            let resolved =
                util::resolve_collector_refs(&j.collector_refs, &named, &format!("job {:?}", j.name))?;
            jobs.push((j, resolved));
        }

        Ok(ResolvedConfig {
            globals: self.globals,
            target,
            jobs,
        })
    }
}
