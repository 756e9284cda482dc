//! Docker Engine API client
//!
//! A thin layer over [`dockwire_transport::UnixHttpAdapter`]: builds
//! versioned request paths, turns error statuses into [`ClientError::Api`],
//! and decodes JSON bodies. Registry credentials are looked up through the
//! helper configured in the Docker CLI's `config.json`.

mod client;
mod error;

pub use client::DockerClient;
pub use error::{ClientError, Result};

pub use dockwire_config::{ApiVersion, ClientConfig, DockerConfigFile};
pub use dockwire_credentials::Credentials;
