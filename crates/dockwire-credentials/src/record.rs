//! The credential record exchanged with helpers

use serde::{Deserialize, Serialize};
use std::fmt;

/// One registry credential as helpers read and write it
///
/// `Username` and `Secret` both empty means "nothing stored"; such a record
/// is never handed to callers.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "ServerURL", default)]
    pub server_url: String,
    #[serde(rename = "Username", default)]
    pub username: String,
    #[serde(rename = "Secret", default)]
    pub secret: String,
}

impl Credentials {
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Whether the record carries neither a username nor a secret
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.secret.is_empty()
    }

    /// Whether the username marks an identity token rather than a password
    pub fn is_identity_token(&self) -> bool {
        self.username == "<token>"
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}
