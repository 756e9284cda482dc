//! Error types for the socket transport

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised while dialing, pooling, or exchanging HTTP over a socket
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket path is missing, is not a socket, or refused the dial
    #[error("failed to connect to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dial did not complete within the configured timeout
    #[error("timed out after {timeout:?} connecting to {}", path.display())]
    ConnectTimeout { path: PathBuf, timeout: Duration },

    /// Every connection in the pool stayed lent for the whole wait
    #[error(
        "connection pool for {} exhausted: {max_size} connections in use after waiting {waited:?}",
        path.display()
    )]
    PoolExhausted {
        path: PathBuf,
        max_size: usize,
        waited: Duration,
    },

    /// The pool was closed (usually by LRU eviction or adapter shutdown)
    #[error("connection pool for {} is closed", path.display())]
    PoolClosed { path: PathBuf },

    /// A socket URL could not be turned into a filesystem path
    #[error("invalid socket url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// I/O failure on an established connection
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer sent something that is not a valid HTTP/1.x response
    #[error("malformed HTTP response: {0}")]
    Protocol(String),

    /// Building the request or response object failed
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),
}

impl TransportError {
    /// Whether this error came from dialing the socket
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectTimeout { .. })
    }

    /// Whether this error came from waiting on a full pool
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }
}
