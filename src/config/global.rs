//! Defaults applied across every job/target unless overridden locally.

use crate::config::duration::ConfigDuration;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct GlobalConfig {
    pub min_interval: ConfigDuration,
    pub scrape_timeout: ConfigDuration,
    pub scrape_timeout_offset: ConfigDuration,
    pub scrape_error_drop_interval: ConfigDuration,
    pub max_connection_lifetime: ConfigDuration,
    pub max_connections: i64,
    pub max_idle_connections: i64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            min_interval: ConfigDuration::zero(),
            scrape_timeout: ConfigDuration::from_secs(10),
            scrape_timeout_offset: ConfigDuration::from_millis(500),
            scrape_error_drop_interval: ConfigDuration::zero(),
            max_connection_lifetime: ConfigDuration::zero(),
            max_connections: 3,
            max_idle_connections: 3,
        }
    }
}

impl GlobalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scrape_timeout_offset.as_duration() <= Duration::ZERO {
            return Err(ConfigError::NonPositiveTimeoutOffset(
                self.scrape_timeout_offset.to_string(),
            ));
        }
        Ok(())
    }
}
