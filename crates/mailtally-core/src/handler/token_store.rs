//! Persisted OAuth token bundles, one JSON file per account.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use mailtally_oauth::provider::GOOGLE_AUTH_URL;
use mailtally_oauth::{ClientSecret, OAuthClient, Provider, Token};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Result;
use crate::paths::write_with_mode;

/// A token together with the client registration that can refresh it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    /// The token itself.
    #[serde(flatten)]
    pub token: Token,
    /// OAuth client ID the token was issued to.
    pub client_id: String,
    /// OAuth client secret, if the registration has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Token endpoint used for refreshes.
    pub token_url: String,
}

impl StoredCredentials {
    /// Bundles a freshly issued token with its registration.
    #[must_use]
    pub fn new(token: Token, secret: &ClientSecret) -> Self {
        Self {
            token,
            client_id: secret.client_id.clone(),
            client_secret: secret.client_secret.clone(),
            token_url: secret.token_url.clone(),
        }
    }

    /// OAuth client able to refresh this token without `credentials.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored token URL is invalid.
    pub fn client(&self) -> mailtally_oauth::Result<OAuthClient> {
        let provider = Provider::google_with(GOOGLE_AUTH_URL, &self.token_url)?;
        provider.validate()?;
        let client = OAuthClient::new(&self.client_id, provider);
        Ok(match &self.client_secret {
            Some(secret) => client.with_client_secret(secret),
            None => client,
        })
    }
}

/// Token file of one account.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the token file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the bundle. Missing, unreadable and corrupt files all yield
    /// `None`; the latter two are logged.
    #[must_use]
    pub fn load(&self) -> Option<StoredCredentials> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No stored token at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Could not read token file {}: {e}", self.path.display());
                return None;
            }
        };

        match serde_json::from_str(&json) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                warn!("Ignoring corrupt token file {}: {e}", self.path.display());
                None
            }
        }
    }

    /// Writes the bundle with owner-only permissions.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, credentials: &StoredCredentials) -> Result<()> {
        let json = serde_json::to_vec_pretty(credentials)?;
        write_with_mode(&self.path, &json, 0o600)?;
        debug!("Saved token to {}", self.path.display());
        Ok(())
    }
}
