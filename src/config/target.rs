//! A DSN plus the collectors to run against it. Collector references are
//! resolved later, by [`super::Config::resolve`] - this struct only holds
//! what was parsed from YAML plus environment overlay.

use crate::config::secret::Secret;
use crate::config::util::check_collector_refs;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "data_source_name")]
    pub dsn: Secret,
    #[serde(default, rename = "aws_secret_name")]
    pub aws_secret_name: Option<String>,
    #[serde(default, rename = "collectors")]
    pub collector_refs: Vec<String>,
    #[serde(default, rename = "enable_ping")]
    pub enable_ping: Option<bool>,
}

impl TargetConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dsn.is_empty() && self.aws_secret_name.is_none() {
            return Err(ConfigError::MissingTargetDsn(self.name.clone()));
        }
        check_collector_refs(&self.collector_refs, "target")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dsn_and_aws_secret_is_rejected() {
        let t = TargetConfig {
            name: "t".to_string(),
            dsn: Secret::default(),
            aws_secret_name: None,
            collector_refs: vec!["c".to_string()],
            enable_ping: None,
        };
        assert!(matches!(
            t.validate(),
            Err(ConfigError::MissingTargetDsn(_))
        ));
    }

    #[test]
    fn aws_secret_name_substitutes_for_an_inline_dsn() {
        let t = TargetConfig {
            name: "t".to_string(),
            dsn: Secret::default(),
            aws_secret_name: Some("prod/db".to_string()),
            collector_refs: vec!["c".to_string()],
            enable_ping: None,
        };
        assert!(t.validate().is_ok());
    }
}
