use crate::version::ApiVersion;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A feature was used against an API version that predates it
    #[error("{feature} is not available for version < {required}")]
    InvalidVersion {
        feature: String,
        required: ApiVersion,
        actual: ApiVersion,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
