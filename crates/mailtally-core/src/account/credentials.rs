//! Password storage in the system keyring.
//!
//! IMAP passwords never appear in `config.json`. They live in the
//! platform's native credential store, keyed by the account email:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use tracing::debug;

/// Service name used for keyring entries.
pub const SERVICE_NAME: &str = "mailtally";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Key/value secret store scoped to one application name.
pub trait SecretStore: Send + Sync {
    /// Looks up the secret stored for `account`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be queried.
    fn get(&self, account: &str) -> CredentialResult<Option<String>>;

    /// Stores `secret` for `account`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store rejects the write.
    fn set(&self, account: &str, secret: &str) -> CredentialResult<()>;
}

/// [`SecretStore`] backed by the OS keyring.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Creates a store for the given keyring service name.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, account: &str) -> CredentialResult<Option<String>> {
        let entry = Entry::new(&self.service, account)?;
        match entry.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => {
                debug!("No password found for {account}");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, account: &str, secret: &str) -> CredentialResult<()> {
        let entry = Entry::new(&self.service, account)?;
        entry.set_password(secret)?;
        debug!("Stored password for {account}");
        Ok(())
    }
}
