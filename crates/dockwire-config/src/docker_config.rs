//! The Docker CLI's `config.json`
//!
//! Only the credential-related keys are read: `credsStore`, `credHelpers`
//! and `auths`. Everything else in the file is ignored.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Inline entry under `auths`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEntry {
    /// base64 `user:password`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(rename = "identitytoken", default, skip_serializing_if = "Option::is_none")]
    pub identity_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerConfigFile {
    /// Helper suffix used for every registry without a per-registry helper
    #[serde(rename = "credsStore", default, skip_serializing_if = "Option::is_none")]
    pub creds_store: Option<String>,

    /// Registry hostname to helper suffix
    #[serde(rename = "credHelpers", default)]
    pub cred_helpers: BTreeMap<String, String>,

    #[serde(default)]
    pub auths: BTreeMap<String, AuthEntry>,
}

impl DockerConfigFile {
    /// `$DOCKER_CONFIG/config.json`, else `~/.docker/config.json`
    pub fn default_path(env: &HashMap<String, String>) -> Option<PathBuf> {
        if let Some(dir) = env.get("DOCKER_CONFIG").filter(|d| !d.is_empty()) {
            return Some(PathBuf::from(dir).join("config.json"));
        }
        env.get("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .map(|home| home.join(".docker").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        debug!(path = %path.display(), "loaded docker config");
        Ok(config)
    }

    /// Load from [`DockerConfigFile::default_path`]; a missing file is empty
    pub fn load_default(env: &HashMap<String, String>) -> Result<Self> {
        match Self::default_path(env) {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })
    }

    /// Helper suffix that serves `registry`
    ///
    /// A per-registry `credHelpers` entry wins over the global `credsStore`.
    /// Registries are matched as written and by bare hostname, so
    /// `https://registry.example.com/v2/` finds a `registry.example.com` entry.
    pub fn helper_for(&self, registry: &str) -> Option<&str> {
        self.cred_helpers
            .get(registry)
            .or_else(|| self.cred_helpers.get(hostname(registry)))
            .or(self.creds_store.as_ref())
            .map(String::as_str)
    }
}

/// Strip scheme and path from a registry address
fn hostname(registry: &str) -> &str {
    let rest = registry
        .strip_prefix("https://")
        .or_else(|| registry.strip_prefix("http://"))
        .unwrap_or(registry);
    rest.split('/').next().unwrap_or(rest)
}
