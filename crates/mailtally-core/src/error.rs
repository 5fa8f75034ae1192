//! Error types for the core library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IMAP operation failed.
    #[error("IMAP error: {0}")]
    Imap(#[from] mailtally_imap::Error),

    /// `OAuth2` operation failed.
    #[error("OAuth error: {0}")]
    OAuth(#[from] mailtally_oauth::Error),

    /// HTTP transport to the Gmail API failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Gmail API answered with an error status.
    #[error("Gmail API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or error message.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The Google client-secret file is not where it is expected.
    #[error("Missing client secret file: {}", .0.display())]
    MissingClientSecret(PathBuf),

    /// An IMAP account has no `imap_server`.
    #[error("Account {0} has no imap_server configured")]
    MissingImapServer(String),

    /// A stored timestamp could not be parsed.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Credential storage error.
    #[error("Credential error: {0}")]
    Credential(#[from] crate::account::CredentialError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
