//! HTTP transport over Unix domain sockets
//!
//! The Docker daemon listens on a filesystem socket rather than a TCP port, so
//! the usual host:port connection machinery does not apply. This crate provides
//! the three layers that replace it:
//!
//! 1. [`UnixConnection`]: a stream dialed to a socket path with a connect/read timeout
//! 2. [`UnixConnectionPool`]: a bounded set of reusable connections to one socket path
//! 3. [`UnixHttpAdapter`]: an LRU cache of pools keyed by logical URL, plus the
//!    HTTP/1.1 exchange that rides on a pooled connection
//!
//! Everything here is blocking. Callers that need cancellation should run the
//! calls on a thread they can abandon; the only built-in cancellation is timeout
//! expiry.
//!
//! ```rust,no_run
//! use dockwire_transport::{AdapterConfig, UnixHttpAdapter};
//!
//! let adapter = UnixHttpAdapter::new("http+unix:///var/run/docker.sock", AdapterConfig::default())?;
//! let request = http::Request::get("http+docker://localhost/_ping").body(Vec::new())?;
//! let response = adapter.send(request)?;
//! assert!(response.status().is_success());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![cfg(unix)]

mod adapter;
mod connection;
mod error;
mod http1;
mod pool;
mod url;

pub use adapter::{AdapterConfig, UnixHttpAdapter, DEFAULT_POOL_KEY};
pub use connection::UnixConnection;
pub use error::{Result, TransportError};
pub use pool::{PoolStats, PooledConnection, UnixConnectionPool};
pub use url::socket_path_from_url;

use std::time::Duration;

/// Default connect/read timeout for socket connections
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of connection pools kept by an adapter
pub const DEFAULT_NUM_POOLS: usize = 25;

/// Default number of connections kept by each pool
pub const DEFAULT_MAX_POOL_SIZE: usize = 10;
