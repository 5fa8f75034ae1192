//! Google client-secret files.
//!
//! The Google Cloud Console hands out `credentials.json` with the client
//! settings nested under either `installed` (desktop apps) or `web`.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::flow::OAuthClient;
use crate::provider::{GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, Provider};

/// OAuth client registration read from a client-secret file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecret {
    /// Client ID.
    pub client_id: String,
    /// Client secret (Google issues one even for desktop clients).
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Authorization endpoint.
    #[serde(default = "default_auth_uri", rename = "auth_uri")]
    pub auth_url: String,
    /// Token endpoint.
    #[serde(default = "default_token_uri", rename = "token_uri")]
    pub token_url: String,
}

#[derive(Deserialize)]
struct SecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

impl ClientSecret {
    /// Parses the contents of a client-secret file.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or has neither an
    /// `installed` nor a `web` section.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: SecretFile = serde_json::from_str(json)?;
        file.installed.or(file.web).ok_or_else(|| {
            Error::InvalidConfig("client secret has no `installed` or `web` section".into())
        })
    }

    /// Reads and parses a client-secret file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Builds the Google provider using this registration's endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoints are not valid URLs.
    pub fn provider(&self) -> Result<Provider> {
        let provider = Provider::google_with(&self.auth_url, &self.token_url)?;
        provider.validate()?;
        Ok(provider)
    }

    /// Builds an OAuth client for this registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoints are not valid URLs.
    pub fn client(&self) -> Result<OAuthClient> {
        let mut client = OAuthClient::new(&self.client_id, self.provider()?);
        if let Some(secret) = &self.client_secret {
            client = client.with_client_secret(secret);
        }
        Ok(client)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_installed_layout() {
        let secret = ClientSecret::from_json(
            r#"{"installed":{"client_id":"id.apps.googleusercontent.com",
                "client_secret":"shh","auth_uri":"https://accounts.google.com/o/oauth2/auth",
                "token_uri":"https://oauth2.googleapis.com/token",
                "redirect_uris":["http://localhost"]}}"#,
        )
        .unwrap();
        assert_eq!(secret.client_id, "id.apps.googleusercontent.com");
        assert_eq!(secret.client_secret.as_deref(), Some("shh"));
    }

    #[test]
    fn parses_web_layout_with_default_endpoints() {
        let secret = ClientSecret::from_json(r#"{"web":{"client_id":"abc"}}"#).unwrap();
        assert_eq!(secret.token_url, GOOGLE_TOKEN_URL);
        assert!(secret.client_secret.is_none());
        assert_eq!(secret.client().unwrap().client_id, "abc");
    }

    #[test]
    fn rejects_file_without_known_section() {
        let err = ClientSecret::from_json(r#"{"other":{}}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientSecret::load(dir.path().join("credentials.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
