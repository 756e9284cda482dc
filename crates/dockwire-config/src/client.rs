//! Client configuration: defaults, TOML file, and `DOCKER_*` environment

use crate::error::{ConfigError, Result};
use crate::version::ApiVersion;
use dockwire_transport::{
    socket_path_from_url, AdapterConfig, DEFAULT_MAX_POOL_SIZE, DEFAULT_NUM_POOLS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Daemon endpoint used when neither the file nor `DOCKER_HOST` names one
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

const ENV_DOCKER_HOST: &str = "DOCKER_HOST";
const ENV_API_VERSION: &str = "DOCKER_API_VERSION";
const ENV_TLS_VERIFY: &str = "DOCKER_TLS_VERIFY";
const ENV_CERT_PATH: &str = "DOCKER_CERT_PATH";
const ENV_TIMEOUT: &str = "DOCKWIRE_TIMEOUT";

/// Copy of the process environment for [`ClientConfig::apply_env`]
///
/// Variables that are not valid UTF-8 are skipped.
pub fn env_snapshot() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Daemon endpoint, e.g. `unix:///var/run/docker.sock` or `tcp://host:2376`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Engine API version used as the path prefix
    #[serde(default)]
    pub version: ApiVersion,

    /// Connect/read/write timeout in seconds; `0` waits forever
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How many per-URL connection pools to keep
    #[serde(default = "default_pool_connections")]
    pub pool_connections: usize,

    /// Connections per pool
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,

    /// Wait for a free connection when a pool is full
    #[serde(default = "default_true")]
    pub pool_block: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,

    /// Credential helper suffix overriding `credsStore` from the docker config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_store: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_DOCKER_HOST.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_pool_connections() -> usize {
    DEFAULT_NUM_POOLS
}

fn default_max_pool_size() -> usize {
    DEFAULT_MAX_POOL_SIZE
}

fn default_true() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            version: ApiVersion::default(),
            timeout_secs: default_timeout_secs(),
            pool_connections: default_pool_connections(),
            max_pool_size: default_max_pool_size(),
            pool_block: true,
            tls: None,
            credentials_store: None,
        }
    }
}

/// Certificate material for a TLS endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_cert: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub verify: bool,
}

impl TlsConfig {
    /// The `ca.pem`/`cert.pem`/`key.pem` layout the Docker CLI uses
    pub fn from_cert_dir(dir: &Path, verify: bool) -> Self {
        Self {
            ca_cert: Some(dir.join("ca.pem")),
            client_cert: Some(dir.join("cert.pem")),
            client_key: Some(dir.join("key.pem")),
            verify,
        }
    }
}

/// How the daemon at `base_url` is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportKind {
    /// Unix domain socket at this path
    Unix(PathBuf),
    /// Plain TCP to `host:port`
    Tcp(String),
    /// TLS over TCP to `host:port`
    Tls(String),
}

impl ClientConfig {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dockwire").join("config.toml"))
    }

    /// Load from `path`, or from [`ClientConfig::default_path`] when it exists
    ///
    /// An explicit path must exist; a missing default file just yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        debug!(path = %path.display(), "loaded client config");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `DOCKER_HOST`, `DOCKER_API_VERSION`, `DOCKER_TLS_VERIFY`,
    /// `DOCKER_CERT_PATH`, and `DOCKWIRE_TIMEOUT` from `env`
    ///
    /// Empty values count as unset. Setting `DOCKER_TLS_VERIFY` or
    /// `DOCKER_CERT_PATH` enables TLS with the certificates in the cert
    /// directory (default `~/.docker`).
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<()> {
        let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        if let Some(host) = get(ENV_DOCKER_HOST) {
            self.base_url = host.to_string();
        }
        if let Some(version) = get(ENV_API_VERSION) {
            self.version = version.parse()?;
        }
        if let Some(timeout) = get(ENV_TIMEOUT) {
            self.timeout_secs = timeout.parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{} must be a number of seconds, got '{}'",
                    ENV_TIMEOUT, timeout
                ))
            })?;
        }

        let verify = get(ENV_TLS_VERIFY).is_some();
        let cert_path = get(ENV_CERT_PATH);
        if verify || cert_path.is_some() {
            let dir = match cert_path {
                Some(dir) => PathBuf::from(dir),
                None => home_dir(env).join(".docker"),
            };
            self.tls = Some(TlsConfig::from_cert_dir(&dir, verify));
        }

        self.validate()
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.version < ApiVersion::MINIMUM {
            return Err(ConfigError::Invalid(format!(
                "API version {} is older than the minimum supported {}",
                self.version,
                ApiVersion::MINIMUM
            )));
        }
        if self.pool_connections == 0 {
            return Err(ConfigError::Invalid("pool_connections must be at least 1".to_string()));
        }
        if self.max_pool_size == 0 {
            return Err(ConfigError::Invalid("max_pool_size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// `None` when `timeout_secs` is zero
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Pool settings for the socket adapter
    pub fn adapter_config(&self) -> AdapterConfig {
        AdapterConfig {
            timeout: self.timeout(),
            pool_connections: self.pool_connections,
            max_pool_size: self.max_pool_size,
            pool_block: self.pool_block,
        }
    }

    /// Classify `base_url`
    pub fn transport(&self) -> Result<TransportKind> {
        let url = self.base_url.trim();

        if url.starts_with("unix://") || url.starts_with("http+unix://") {
            let path = socket_path_from_url(url).map_err(|e| ConfigError::Invalid(e.to_string()))?;
            return Ok(TransportKind::Unix(path));
        }
        if url.starts_with('/') {
            return Ok(TransportKind::Unix(PathBuf::from(url)));
        }

        let (scheme, rest) = url.split_once("://").ok_or_else(|| {
            ConfigError::Invalid(format!("daemon address '{}' has no scheme", url))
        })?;
        let address = rest.trim_end_matches('/');
        if address.is_empty() {
            return Err(ConfigError::Invalid(format!("daemon address '{}' has no host", url)));
        }

        match scheme {
            "https" => Ok(TransportKind::Tls(address.to_string())),
            "tcp" | "http" if self.tls.is_some() => Ok(TransportKind::Tls(address.to_string())),
            "tcp" | "http" => Ok(TransportKind::Tcp(address.to_string())),
            other => Err(ConfigError::Invalid(format!("unsupported daemon scheme '{}'", other))),
        }
    }
}

fn home_dir(env: &HashMap<String, String>) -> PathBuf {
    env.get("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}
