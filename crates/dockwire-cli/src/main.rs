use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dockwire_cli::{
    cli::Cli,
    commands,
    config::{self, Overrides},
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    let filter = match cli.level_filter() {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let env = dockwire_config::env_snapshot();
    let overrides = Overrides {
        host: cli.host.clone(),
        api_version: cli.api_version.clone(),
        timeout_secs: cli.timeout,
    };
    let config = config::resolve(cli.config.as_deref(), &env, &overrides)?;
    debug!(base_url = %config.base_url, version = %config.version, "resolved config");

    let output = commands::run(cli.command, config, &env)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
