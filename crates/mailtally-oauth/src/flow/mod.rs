//! Obtaining tokens: the authorization code flow, its loopback redirect
//! target, and refresh.

mod code;
mod loopback;
mod pkce;

pub use code::AuthorizationCodeFlow;
pub use loopback::LoopbackServer;
pub use pkce::PkceChallenge;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::Rng;
use reqwest::Client;
use tracing::debug;

use crate::error::Result;
use crate::provider::Provider;
use crate::token::{ErrorResponse, Token, TokenResponse};

/// Generates an unguessable `state` value for CSRF protection.
#[must_use]
pub fn random_state() -> String {
    let bytes: [u8; 16] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// What is traded at the token endpoint.
enum Grant<'a> {
    Refresh {
        refresh_token: &'a str,
    },
    Code {
        code: &'a str,
        redirect_uri: Option<&'a str>,
        verifier: Option<&'a str>,
    },
}

impl Grant<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Refresh { .. } => "refresh_token",
            Self::Code { .. } => "authorization_code",
        }
    }
}

/// A registered application at one provider.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Application identifier.
    pub client_id: String,
    /// Secret for confidential clients. Installed apps may omit it.
    pub client_secret: Option<String>,
    /// Where the provider sends the browser after consent.
    pub redirect_uri: Option<String>,
    /// Endpoints and scopes.
    pub provider: Provider,
    http: Client,
}

impl OAuthClient {
    /// Public client without a secret or redirect.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: None,
            provider,
            http: Client::new(),
        }
    }

    /// Adds the client secret sent with every token request.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the default redirect URI for code exchange.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Trades the refresh token of `token` for a fresh access token.
    ///
    /// Providers that do not rotate refresh tokens omit it from the answer;
    /// the old one is kept in that case.
    ///
    /// # Errors
    ///
    /// [`crate::Error::NoRefreshToken`] before any request if `token` has
    /// none, otherwise transport or provider errors.
    pub async fn refresh_token(&self, token: &Token) -> Result<Token> {
        let refresh_token = token.refresh_token()?;
        let mut fresh = self.request(Grant::Refresh { refresh_token }).await?;
        if fresh.refresh_token.is_none() {
            fresh.refresh_token.clone_from(&token.refresh_token);
        }
        Ok(fresh)
    }

    /// Trades an authorization code. `redirect_uri` falls back to the
    /// client's own.
    pub(crate) async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
        verifier: Option<&str>,
    ) -> Result<Token> {
        let redirect_uri = redirect_uri.or(self.redirect_uri.as_deref());
        self.request(Grant::Code {
            code,
            redirect_uri,
            verifier,
        })
        .await
    }

    async fn request(&self, grant: Grant<'_>) -> Result<Token> {
        let grant_type = grant.name();
        let mut form = vec![("grant_type", grant_type), ("client_id", self.client_id.as_str())];
        if let Some(secret) = self.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        match grant {
            Grant::Refresh { refresh_token } => form.push(("refresh_token", refresh_token)),
            Grant::Code {
                code,
                redirect_uri,
                verifier,
            } => {
                form.push(("code", code));
                form.extend(redirect_uri.map(|uri| ("redirect_uri", uri)));
                form.extend(verifier.map(|v| ("code_verifier", v)));
            }
        }

        debug!(provider = %self.provider.name, grant_type, "token request");
        let response = self
            .http
            .post(self.provider.token_url.clone())
            .form(&form)
            .send()
            .await?;

        if response.status().is_success() {
            let body: TokenResponse = response.json().await?;
            Ok(Token::from_response(body, Utc::now()))
        } else {
            let body: ErrorResponse = response.json().await?;
            Err(body.into_error())
        }
    }
}
