//! A named, reusable query.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    #[serde(rename = "query_name")]
    pub name: String,
    pub query: String,
    #[serde(default, rename = "no_prepared_statement")]
    pub no_prepared_statement: bool,
}

impl QueryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingQueryName);
        }
        if self.query.is_empty() {
            return Err(ConfigError::MissingQueryLiteral(self.name.clone()));
        }
        Ok(())
    }
}
