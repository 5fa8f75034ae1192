//! Account model types.

use serde::{Deserialize, Serialize};

/// `type` value selecting the Gmail API handler.
pub const OAUTH_MAIL_TYPE: &str = "oauth_mail";

/// Port used when an IMAP account omits `imap_port`.
pub const DEFAULT_IMAP_PORT: u16 = 993;

/// One entry of `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDescriptor {
    /// Display name, also the key in results.
    pub name: String,
    /// Login address.
    pub email: String,
    /// Raw `type` field. See [`AccountDescriptor::handler_kind`].
    #[serde(rename = "type")]
    pub account_type: String,
    /// IMAP host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imap_server: Option<String>,
    /// IMAP port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imap_port: Option<u16>,
}

/// Which handler checks an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Gmail REST API with `OAuth2`.
    OAuth,
    /// IMAP with a keyring password.
    Imap,
}

impl AccountDescriptor {
    /// Creates an account checked through the Gmail API.
    #[must_use]
    pub fn oauth(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            account_type: OAUTH_MAIL_TYPE.to_string(),
            imap_server: None,
            imap_port: None,
        }
    }

    /// Creates an IMAP account.
    #[must_use]
    pub fn imap(
        name: impl Into<String>,
        email: impl Into<String>,
        server: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            account_type: "imap".to_string(),
            imap_server: Some(server.into()),
            imap_port: Some(port),
        }
    }

    /// Maps the `type` field to a handler.
    ///
    /// Only the exact string `oauth_mail` selects OAuth; every other value,
    /// including unknown ones, is treated as IMAP.
    #[must_use]
    pub fn handler_kind(&self) -> HandlerKind {
        if self.account_type == OAUTH_MAIL_TYPE {
            HandlerKind::OAuth
        } else {
            HandlerKind::Imap
        }
    }
}
