//! # dockwire configuration
//!
//! Settings are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config` or `$XDG_CONFIG_HOME/dockwire/config.toml`)
//! 3. the `DOCKER_*` environment variables
//! 4. command-line flags, applied by the caller
//!
//! ```rust,no_run
//! use dockwire_config::{env_snapshot, ClientConfig};
//!
//! # fn main() -> Result<(), dockwire_config::ConfigError> {
//! let mut config = ClientConfig::load(None)?;
//! config.apply_env(&env_snapshot())?;
//! println!("talking to {}", config.base_url);
//! # Ok(())
//! # }
//! ```
//!
//! [`DockerConfigFile`] reads the Docker CLI's own `config.json` to find
//! which credential helper serves a registry.

mod client;
mod docker_config;
mod error;
mod version;

pub use client::{env_snapshot, ClientConfig, TlsConfig, TransportKind, DEFAULT_DOCKER_HOST};
pub use docker_config::{AuthEntry, DockerConfigFile};
pub use error::{ConfigError, Result};
pub use version::ApiVersion;
