//! Error types for credential helper calls

use thiserror::Error;

/// Result type alias for credential operations
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Outcome of a credential operation that did not produce a result
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The helper has no usable entry for the requested server
    #[error("No matching credentials in {program}")]
    NotFound { program: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CredentialError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failures launching or talking to a helper program
#[derive(Debug, Error)]
pub enum StoreError {
    /// The executable was not on PATH at construction, or vanished before launch
    #[error("{program} not installed or not available in PATH")]
    NotInstalled { program: String },

    /// The OS refused to start the helper for a reason other than a missing file
    #[error("Unexpected OS error \"{message}\", errno={errno}")]
    Launch {
        program: String,
        errno: i32,
        message: String,
    },

    /// The helper exited non-zero; `message` is what it printed
    #[error("Credentials store {program} exited with \"{message}\".")]
    HelperFailed {
        program: String,
        exit_code: Option<i32>,
        message: String,
    },

    /// The helper did not exit before the configured deadline and was killed
    #[error("Credentials store {program} did not finish within {timeout:?}")]
    Timeout {
        program: String,
        timeout: std::time::Duration,
    },

    /// The helper exited zero but printed something that is not the expected JSON
    #[error("Credentials store {program} returned malformed output: {source}")]
    MalformedOutput {
        program: String,
        #[source]
        source: serde_json::Error,
    },

    /// Pipe I/O with a running helper failed
    #[error("I/O error talking to {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Name of the helper program involved
    pub fn program(&self) -> &str {
        match self {
            Self::NotInstalled { program }
            | Self::Launch { program, .. }
            | Self::HelperFailed { program, .. }
            | Self::Timeout { program, .. }
            | Self::MalformedOutput { program, .. }
            | Self::Io { program, .. } => program,
        }
    }
}
