//! Command handlers
//!
//! Every handler returns a JSON value; `main` prints it.

pub mod credentials;
pub mod daemon;

use crate::cli::Commands;
use anyhow::Result;
use dockwire_config::ClientConfig;
use serde_json::Value;
use std::collections::HashMap;

/// Dispatch one parsed command
pub fn run(
    command: Commands,
    config: ClientConfig,
    env: &HashMap<String, String>,
) -> Result<Value> {
    match command {
        Commands::Ping => daemon::ping(config),
        Commands::Version => daemon::version(config),
        Commands::Info => daemon::info(config),
        Commands::Ps { all } => daemon::ps(config, all),
        Commands::Df => daemon::df(config),
        Commands::Credentials(cmd) => credentials::execute(cmd, &config, env),
    }
}
