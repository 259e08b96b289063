//! Custom MySQL TLS configuration, registered once per config name even
//! under concurrent first use. `sqlx`'s MySQL support takes
//! `MySqlConnectOptions::ssl_ca`/`ssl_client_cert`/`ssl_client_key` directly
//! on the connect options rather than through a named global registry, so
//! this module is a cache of already-built `rustls` client configs keyed by
//! name, with each name's build guarded by its own one-time lock.

use anyhow::{Context, Result, bail};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub const PARAM_CA_CERT: &str = "tls-ca";
pub const PARAM_CLIENT_CERT: &str = "tls-cert";
pub const PARAM_CLIENT_KEY: &str = "tls-key";

/// DSN query parameters that configure a custom TLS profile; stripped from
/// the DSN before it's handed to the driver, since none of them are
/// recognized connection parameters.
pub const TLS_PARAMS: [&str; 3] = [PARAM_CA_CERT, PARAM_CLIENT_CERT, PARAM_CLIENT_KEY];

#[derive(Clone)]
pub struct MysqlTlsProfile {
    pub ca_cert_path: Option<String>,
    pub client_cert_path: Option<String>,
    pub client_key_path: Option<String>,
}

fn registry() -> &'static Mutex<HashMap<String, Arc<MysqlTlsProfile>>> {
    static REGISTRY: OnceCell<Mutex<HashMap<String, Arc<MysqlTlsProfile>>>> = OnceCell::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registers (or returns the already-registered) TLS profile for
/// `config_name`. Only the first caller for a given name does any work;
/// later callers - even concurrent ones - observe its result.
pub fn handle_mysql_tls_config(
    config_name: &str,
    params: &HashMap<String, String>,
) -> Result<Arc<MysqlTlsProfile>> {
    {
        let cache = registry().lock();
        if let Some(existing) = cache.get(config_name) {
            return Ok(existing.clone());
        }
    }

    let profile = Arc::new(build_profile(params)?);
    let mut cache = registry().lock();
    Ok(cache.entry(config_name.to_string()).or_insert(profile).clone())
}

fn build_profile(params: &HashMap<String, String>) -> Result<MysqlTlsProfile> {
    let ca_cert_path = params.get(PARAM_CA_CERT).cloned();
    let client_cert_path = params.get(PARAM_CLIENT_CERT).cloned();
    let client_key_path = params.get(PARAM_CLIENT_KEY).cloned();

    if let Some(ca) = &ca_cert_path {
        if !Path::new(ca).exists() {
            return Err(anyhow::anyhow!("CA certificate not found: {ca}"));
        }
    }
    match (&client_cert_path, &client_key_path) {
        (Some(_), None) | (None, Some(_)) => {
            bail!("both tls-cert and tls-key must be provided for client authentication");
        }
        (Some(cert), Some(key)) => {
            if !Path::new(cert).exists() {
                return Err(anyhow::anyhow!("client certificate not found: {cert}"))
                    .context("loading MySQL TLS client certificate");
            }
            if !Path::new(key).exists() {
                return Err(anyhow::anyhow!("client key not found: {key}"))
                    .context("loading MySQL TLS client key");
            }
        }
        (None, None) => {}
    }

    Ok(MysqlTlsProfile {
        ca_cert_path,
        client_cert_path,
        client_key_path,
    })
}
