//! Configuration loading.
//!
//! The alert configuration is read from a TOML or JSON file (chosen by
//! extension) and then overridden from `TOCSIN_`-prefixed environment
//! variables, e.g. `TOCSIN_STRATEGY=failover` or `TOCSIN_MAX_RETRIES=5`.
//! Without a file, only the environment and the built-in defaults apply.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Json, Toml};
use tocsin_alerts::AlertsConfig;
use tracing::debug;

use crate::error::CliError;

/// Environment prefix for configuration overrides.
pub const ENV_PREFIX: &str = "TOCSIN_";

/// Loads the alert configuration.
///
/// # Errors
///
/// Returns `CliError::Config` if the file is missing, has an unsupported
/// extension, or does not deserialize.
pub fn load(path: Option<&Path>) -> Result<AlertsConfig, CliError> {
    let mut figment = Figment::new();

    if let Some(path) = path {
        if !path.is_file() {
            return Err(CliError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        figment = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => figment.merge(Toml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            other => {
                return Err(CliError::Config(format!(
                    "unsupported config format '{}' (expected .toml or .json)",
                    other.unwrap_or_default()
                )));
            }
        };
        debug!(path = %path.display(), "loading alert configuration");
    }

    let config: AlertsConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]))
        .extract()?;
    Ok(config)
}
