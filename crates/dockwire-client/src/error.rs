use dockwire_config::ConfigError;
use dockwire_credentials::CredentialError;
use dockwire_transport::TransportError;
use http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    /// The daemon answered with a non-2xx status
    #[error("daemon returned {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("unexpected response body: {0}")]
    Json(#[from] serde_json::Error),

    /// `base_url` names a transport this client does not speak
    #[error("unsupported daemon address {0}: only unix sockets are supported")]
    UnsupportedTransport(String),
}

impl ClientError {
    /// Whether the daemon could not be reached at all
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connection_error())
    }

    /// HTTP status of an API error
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
