//! Commands that query the daemon

use anyhow::{Context, Result};
use dockwire_client::DockerClient;
use dockwire_config::ClientConfig;
use serde_json::{json, Value};
use tracing::debug;

fn connect(config: ClientConfig) -> Result<DockerClient> {
    let base_url = config.base_url.clone();
    DockerClient::new(config).with_context(|| format!("cannot use daemon at {}", base_url))
}

pub fn ping(config: ClientConfig) -> Result<Value> {
    let client = connect(config)?;
    let ok = client.ping().context("ping failed")?;
    Ok(json!({ "ok": ok, "api_version": client.api_version().to_string() }))
}

pub fn version(config: ClientConfig) -> Result<Value> {
    connect(config)?.version().context("fetching version")
}

pub fn info(config: ClientConfig) -> Result<Value> {
    connect(config)?.info().context("fetching info")
}

pub fn ps(config: ClientConfig, all: bool) -> Result<Value> {
    let containers = connect(config)?.containers(all).context("listing containers")?;
    debug!(count = containers.len(), all, "listed containers");
    Ok(Value::Array(containers))
}

pub fn df(config: ClientConfig) -> Result<Value> {
    connect(config)?.df().context("fetching disk usage")
}
