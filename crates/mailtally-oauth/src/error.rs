//! Errors raised while obtaining or refreshing tokens.

use std::io;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Token acquisition failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The token endpoint answered with an error document, or the redirect
    /// carried an `error` parameter.
    #[error("authorization server rejected the request: {code} ({description})")]
    Provider {
        /// Error code such as `invalid_grant`.
        code: String,
        /// Free-form text from the server, possibly empty.
        description: String,
    },

    /// Refresh was requested for a token that never had a refresh token.
    #[error("token has no refresh token")]
    NoRefreshToken,

    /// The operator declined on the consent page.
    #[error("authorization was denied")]
    AccessDenied,

    /// The redirect carried a `state` other than the one we sent.
    #[error("authorization redirect state mismatch")]
    StateMismatch,

    /// Client secret or provider settings are unusable.
    #[error("invalid OAuth configuration: {0}")]
    InvalidConfig(String),

    /// Endpoint or redirect URL did not parse.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Talking to the token endpoint failed.
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed JSON from disk or the network.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Socket or file failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Builds [`Error::Provider`].
    #[must_use]
    pub fn provider(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Provider {
            code: code.into(),
            description: description.into(),
        }
    }
}
