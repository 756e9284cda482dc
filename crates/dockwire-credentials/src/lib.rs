//! Docker credential helper client
//!
//! Registry credentials live in external helper programs named
//! `docker-credential-<name>` (`osxkeychain`, `pass`, `secretservice`,
//! `desktop`, ...). Each operation launches the helper once with a
//! subcommand and exchanges a small payload over stdin/stdout.
//!
//! ```no_run
//! use dockwire_credentials::{CredentialStore, HelperStore};
//!
//! # fn main() -> Result<(), dockwire_credentials::CredentialError> {
//! let store = HelperStore::new("pass");
//! store.store("https://index.docker.io/v1/", "alice", "s3cret")?;
//! let creds = store.get("https://index.docker.io/v1/")?;
//! assert_eq!(creds.username, "alice");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod helper;
pub mod record;

pub use error::{CredentialError, Result, StoreError};
pub use helper::HelperStore;
pub use record::Credentials;

use std::collections::BTreeMap;

/// Prefix every helper executable carries
pub const PROGRAM_PREFIX: &str = "docker-credential-";

/// A backend that can hold registry credentials
///
/// [`HelperStore`] is the production implementation; the trait lets callers
/// swap in an in-memory store.
pub trait CredentialStore: Send + Sync {
    /// Look up the credentials stored for `server`
    ///
    /// Fails with [`CredentialError::NotFound`] when nothing usable is stored.
    fn get(&self, server: &str) -> Result<Credentials>;

    /// Save `username`/`secret` for `server`, replacing any previous entry
    fn store(&self, server: &str, username: &str, secret: &str) -> Result<()>;

    /// Remove the entry for `server`
    fn erase(&self, server: &str) -> Result<()>;

    /// Map every stored server URL to its username
    fn list(&self) -> Result<BTreeMap<String, String>>;
}
