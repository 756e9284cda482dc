//! Typed calls against one Docker daemon

use crate::error::{ClientError, Result};
use dockwire_config::{env_snapshot, ApiVersion, ClientConfig, DockerConfigFile, TransportKind};
use dockwire_credentials::{CredentialStore, Credentials, HelperStore};
use dockwire_transport::UnixHttpAdapter;
use http::{Request, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

/// Logical base for every request; the adapter only looks at the path
const BASE: &str = "http+docker://localhost";

/// `GET /system/df` first appeared in API 1.25
const DF_MIN_VERSION: ApiVersion = ApiVersion::new(1, 25);

/// Client for one Docker daemon
#[derive(Debug)]
pub struct DockerClient {
    config: ClientConfig,
    adapter: UnixHttpAdapter,
    credstore_env: HashMap<String, String>,
}

impl DockerClient {
    /// Connect lazily to the daemon described by `config`
    ///
    /// Nothing is dialed until the first request.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let socket_path = match config.transport()? {
            TransportKind::Unix(path) => path,
            TransportKind::Tcp(address) => {
                return Err(ClientError::UnsupportedTransport(format!("tcp://{}", address)))
            }
            TransportKind::Tls(address) => {
                return Err(ClientError::UnsupportedTransport(format!("https://{}", address)))
            }
        };

        info!(
            socket = %socket_path.display(),
            version = %config.version,
            "docker client configured"
        );
        let adapter = UnixHttpAdapter::with_socket_path(socket_path, config.adapter_config());
        Ok(Self {
            config,
            adapter,
            credstore_env: HashMap::new(),
        })
    }

    /// Extra environment for credential helper processes
    pub fn with_credstore_env(mut self, env: HashMap<String, String>) -> Self {
        self.credstore_env = env;
        self
    }

    /// Defaults, then the config file, then the `DOCKER_*` environment
    pub fn from_env() -> Result<Self> {
        let mut config = ClientConfig::load(None)?;
        config.apply_env(&env_snapshot())?;
        Self::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api_version(&self) -> ApiVersion {
        self.config.version
    }

    /// Whether the daemon answers `/_ping` with `OK`
    pub fn ping(&self) -> Result<bool> {
        let response = self.get("/_ping")?;
        Ok(response.body().as_slice() == b"OK")
    }

    /// `GET /version`
    pub fn version(&self) -> Result<Value> {
        self.get_json("/version")
    }

    /// `GET /info`
    pub fn info(&self) -> Result<Value> {
        self.get_json("/info")
    }

    /// `GET /containers/json`; stopped containers are included when `all` is set
    pub fn containers(&self, all: bool) -> Result<Vec<Value>> {
        let all = if all { 1 } else { 0 };
        self.get_json(&format!("/containers/json?all={}&limit=-1&size=0&trunc_cmd=0", all))
    }

    /// `GET /system/df`, available from API 1.25
    pub fn df(&self) -> Result<Value> {
        self.config.version.require(DF_MIN_VERSION, "df")?;
        self.get_json("/system/df")
    }

    /// `GET` a versioned endpoint and decode its JSON body
    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.get(path)?;
        Ok(serde_json::from_slice(response.body())?)
    }

    /// Credentials for `registry` from the helper that serves it
    ///
    /// The helper is the per-registry entry in `credHelpers`, else
    /// `credentials_store` from the client config, else `credsStore`.
    /// Returns `None` when no helper is configured or it has no entry.
    pub fn registry_credentials(
        &self,
        registry: &str,
        docker_config: &DockerConfigFile,
    ) -> Result<Option<Credentials>> {
        let mut lookup = docker_config.clone();
        if let Some(store) = &self.config.credentials_store {
            lookup.creds_store = Some(store.clone());
        }

        let Some(helper) = lookup.helper_for(registry) else {
            debug!(registry, "no credential helper configured");
            return Ok(None);
        };
        let store = HelperStore::with_environment(helper, self.credstore_env.clone());
        credentials_from(&store, registry)
    }

    /// Close every pooled connection
    pub fn close(&self) {
        self.adapter.close();
    }

    fn get(&self, path: &str) -> Result<Response<Vec<u8>>> {
        let uri = format!("{}{}{}", BASE, self.config.version.path_prefix(), path);
        let request = Request::get(uri)
            .body(Vec::new())
            .map_err(dockwire_transport::TransportError::from)?;

        let response = self.adapter.send(request)?;
        check_status(response)
    }
}

/// Look `registry` up in `store`, mapping "not found" to `None`
pub(crate) fn credentials_from(
    store: &dyn CredentialStore,
    registry: &str,
) -> Result<Option<Credentials>> {
    match store.get(registry) {
        Ok(credentials) => Ok(Some(credentials)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn check_status(response: Response<Vec<u8>>) -> Result<Response<Vec<u8>>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // The daemon reports errors as {"message": "..."}; fall back to the raw body.
    let body = response.body();
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

    debug!(%status, %message, "daemon returned an error");
    Err(ClientError::Api { status, message })
}
