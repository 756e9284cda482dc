//! Config layering for the CLI: file, then environment, then flags

use anyhow::{Context, Result};
use dockwire_config::{ApiVersion, ClientConfig};
use std::collections::HashMap;
use std::path::Path;

/// Values given on the command line; `None` leaves lower layers alone
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub api_version: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Build the effective client config
pub fn resolve(
    path: Option<&Path>,
    env: &HashMap<String, String>,
    overrides: &Overrides,
) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(path).context("loading config file")?;
    config.apply_env(env).context("reading DOCKER_* environment")?;

    if let Some(host) = &overrides.host {
        config.base_url = host.clone();
    }
    if let Some(version) = &overrides.api_version {
        config.version = version
            .parse::<ApiVersion>()
            .with_context(|| format!("invalid --api-version '{}'", version))?;
    }
    if let Some(timeout) = overrides.timeout_secs {
        config.timeout_secs = timeout;
    }

    config.validate()?;
    Ok(config)
}
