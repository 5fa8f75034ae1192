//! Account handlers.
//!
//! Every account is checked through [`MailHandler`]. Failures never escape a
//! handler: they are logged and reported as [`CHECK_FAILED`].

pub mod gmail;
pub mod imap;
pub mod oauth;
pub mod token_store;

use std::sync::Arc;

use async_trait::async_trait;
use mailtally_oauth::{Clock, SystemClock};

use crate::Result;
use crate::account::{AccountDescriptor, HandlerKind, KeyringStore, SecretStore};
use crate::paths::Paths;
use crate::prompt::{Prompt, TerminalPrompt};

pub use gmail::{GmailApi, GmailRest, MessagePage};
pub use imap::{ImapConnect, ImapIo, ImapMailHandler, TlsConnect};
pub use oauth::{GoogleGateway, OAuthGateway, OAuthMailHandler};
pub use token_store::{StoredCredentials, TokenStore};

/// Count reported for an account whose check failed.
pub const CHECK_FAILED: i64 = -1;

/// Capability shared by every account type.
#[async_trait]
pub trait MailHandler: Send + Sync {
    /// The account this handler checks.
    fn account(&self) -> &AccountDescriptor;

    /// Which protocol this handler speaks.
    fn kind(&self) -> HandlerKind;

    /// Number of unread messages in INBOX, or [`CHECK_FAILED`].
    async fn get_unread_count(&mut self) -> i64;
}

/// External collaborators the handlers talk to.
#[derive(Clone)]
pub struct Services {
    /// Password storage for IMAP accounts.
    pub secrets: Arc<dyn SecretStore>,
    /// Operator interaction.
    pub prompt: Arc<dyn Prompt>,
    /// Token refresh and browser authorization.
    pub oauth: Arc<dyn OAuthGateway>,
    /// Gmail message listing.
    pub gmail: Arc<dyn GmailApi>,
    /// IMAP transport.
    pub imap: Arc<dyn ImapConnect>,
    /// Time source for token expiry.
    pub clock: Arc<dyn Clock>,
}

impl Services {
    /// Real keyring, terminal, Google endpoints, TLS and wall clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn system() -> Result<Self> {
        let prompt: Arc<dyn Prompt> = Arc::new(TerminalPrompt);
        Ok(Self {
            secrets: Arc::new(KeyringStore::default()),
            oauth: Arc::new(GoogleGateway::new(Arc::clone(&prompt))),
            prompt,
            gmail: Arc::new(GmailRest::new()?),
            imap: Arc::new(TlsConnect),
            clock: Arc::new(SystemClock),
        })
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

/// Builds the handler for `account` according to its `type`.
#[must_use]
pub fn build(account: AccountDescriptor, paths: &Paths, services: &Services) -> Box<dyn MailHandler> {
    match account.handler_kind() {
        HandlerKind::OAuth => Box::new(OAuthMailHandler::new(account, paths, services)),
        HandlerKind::Imap => Box::new(ImapMailHandler::new(account, services)),
    }
}

fn to_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
