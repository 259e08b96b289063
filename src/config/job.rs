//! A set of collectors applied to many statically-defined targets at once.

use crate::config::secret::Secret;
use crate::config::util::check_collector_refs;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    #[serde(rename = "job_name")]
    pub name: String,
    #[serde(default, rename = "collectors")]
    pub collector_refs: Vec<String>,
    #[serde(default, rename = "static_configs")]
    pub static_configs: Vec<StaticConfig>,
    #[serde(default, rename = "enable_ping")]
    pub enable_ping: Option<bool>,
}

impl JobConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingJobName);
        }
        check_collector_refs(&self.collector_refs, &format!("job {:?}", self.name))?;
        if self.static_configs.is_empty() {
            return Err(ConfigError::NoTargets(self.name.clone()));
        }
        for sc in &self.static_configs {
            sc.validate(&self.name)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StaticConfig {
    #[serde(default)]
    pub targets: HashMap<String, Secret>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl StaticConfig {
    fn validate(&self, job: &str) -> Result<(), ConfigError> {
        let mut names: HashSet<&str> = HashSet::new();
        let mut dsns: HashSet<&str> = HashSet::new();
        for (tname, dsn) in &self.targets {
            if tname.is_empty() {
                return Err(ConfigError::EmptyStaticTargetName(job.to_string()));
            }
            if !names.insert(tname.as_str()) {
                return Err(ConfigError::DuplicateStaticTargetName {
                    target: tname.clone(),
                    job: job.to_string(),
                });
            }
            if dsn.is_empty() {
                return Err(ConfigError::EmptyStaticDsn {
                    target: tname.clone(),
                    job: job.to_string(),
                });
            }
            if !dsns.insert(dsn.expose()) {
                return Err(ConfigError::DuplicateStaticDsn {
                    target: tname.clone(),
                    job: job.to_string(),
                });
            }
        }
        Ok(())
    }
}
