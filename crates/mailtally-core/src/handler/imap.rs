//! IMAP accounts, authenticated with a password from the keyring.

use std::sync::Arc;

use async_trait::async_trait;
use mailtally_imap::{Client, Error as ImapError};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{Instrument, Span, debug, error, info, info_span};

use super::{CHECK_FAILED, MailHandler, Services, to_count};
use crate::account::{AccountDescriptor, DEFAULT_IMAP_PORT, HandlerKind, SecretStore};
use crate::prompt::Prompt;
use crate::{Error, Result};

const INBOX: &str = "INBOX";
const UNSEEN: &str = "UNSEEN";

/// Byte stream an IMAP session can run over.
pub trait ImapIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ImapIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Opens IMAP transports.
#[async_trait]
pub trait ImapConnect: Send + Sync {
    /// Connects to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn ImapIo>>;
}

/// [`ImapConnect`] over implicit TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsConnect;

#[async_trait]
impl ImapConnect for TlsConnect {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn ImapIo>> {
        let stream = mailtally_imap::connect_tls(host, port).await?;
        Ok(Box::new(stream))
    }
}

/// Handler for every account that is not `oauth_mail`.
pub struct ImapMailHandler {
    account: AccountDescriptor,
    secrets: Arc<dyn SecretStore>,
    prompt: Arc<dyn Prompt>,
    connector: Arc<dyn ImapConnect>,
    span: Span,
}

impl ImapMailHandler {
    /// Creates a handler for `account`.
    #[must_use]
    pub fn new(account: AccountDescriptor, services: &Services) -> Self {
        let span = info_span!("account", name = %account.name, kind = "imap");
        Self {
            account,
            secrets: Arc::clone(&services.secrets),
            prompt: Arc::clone(&services.prompt),
            connector: Arc::clone(&services.imap),
            span,
        }
    }

    /// Returns the stored password, prompting for it and storing it on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyring or the terminal fails.
    pub fn get_password(&self) -> Result<String> {
        if let Some(password) = self.secrets.get(&self.account.email)? {
            return Ok(password);
        }

        let password = self.prompt.password(&format!(
            "Enter password for {} ({}):",
            self.account.name, self.account.email
        ))?;
        self.secrets.set(&self.account.email, &password)?;
        Ok(password)
    }

    async fn check(&self) -> Result<i64> {
        let host = self
            .account
            .imap_server
            .as_deref()
            .ok_or_else(|| Error::MissingImapServer(self.account.name.clone()))?;
        let port = self.account.imap_port.unwrap_or(DEFAULT_IMAP_PORT);

        let stream = self.connector.connect(host, port).await?;
        let client = Client::from_stream(stream).await?;

        let password = match self.get_password() {
            Ok(password) => password,
            Err(e) => {
                logout_quietly(client).await;
                return Err(e);
            }
        };
        let client = match client.login(&self.account.email, &password).await {
            Ok(client) => client,
            Err((client, e)) => return Err(abandon(client, e).await),
        };
        let (mut client, mailbox) = match client.select(INBOX).await {
            Ok(selected) => selected,
            Err((client, e)) => return Err(abandon(client, e).await),
        };
        debug!(exists = mailbox.exists, recent = mailbox.recent, "INBOX selected");

        let search = client.search(UNSEEN).await;
        logout_quietly(client).await;

        match search {
            Ok(ids) => Ok(to_count(ids.len())),
            Err(e) if e.is_rejection() => {
                error!("Failed to search for UNSEEN messages in {}", self.account.name);
                Ok(CHECK_FAILED)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn count_unread(&self) -> i64 {
        match self.check().await {
            Ok(CHECK_FAILED) => CHECK_FAILED,
            Ok(count) => {
                info!("{}: {count} unread messages", self.account.name);
                count
            }
            Err(e) => {
                error!("Error checking {}: {e}", self.account.name);
                CHECK_FAILED
            }
        }
    }
}

async fn logout_quietly<St>(client: Client<Box<dyn ImapIo>, St>) {
    if let Err(e) = client.logout().await {
        debug!("Ignoring LOGOUT failure: {e}");
    }
}

/// Logs out after a rejected command, while the connection is still usable.
async fn abandon<St>(client: Client<Box<dyn ImapIo>, St>, error: ImapError) -> Error {
    if error.is_rejection() {
        logout_quietly(client).await;
    }
    error.into()
}

#[async_trait]
impl MailHandler for ImapMailHandler {
    fn account(&self) -> &AccountDescriptor {
        &self.account
    }

    fn kind(&self) -> HandlerKind {
        HandlerKind::Imap
    }

    async fn get_unread_count(&mut self) -> i64 {
        let span = self.span.clone();
        self.count_unread().instrument(span).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;

    use mailtally_oauth::SystemClock;
    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::account::CredentialResult;
    use crate::handler::{GmailApi, MessagePage, OAuthGateway, StoredCredentials};

    #[derive(Default)]
    struct MemoryStore(Mutex<HashMap<String, String>>);

    impl SecretStore for MemoryStore {
        fn get(&self, account: &str) -> CredentialResult<Option<String>> {
            Ok(self.0.lock().unwrap().get(account).cloned())
        }

        fn set(&self, account: &str, secret: &str) -> CredentialResult<()> {
            self.0
                .lock()
                .unwrap()
                .insert(account.to_string(), secret.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct ScriptedPrompt {
        passwords_asked: Mutex<Vec<String>>,
    }

    impl Prompt for ScriptedPrompt {
        fn password(&self, message: &str) -> io::Result<String> {
            self.passwords_asked.lock().unwrap().push(message.to_string());
            Ok("typed".to_string())
        }

        fn confirm(&self, _question: &str) -> io::Result<bool> {
            Ok(false)
        }

        fn notice(&self, _message: &str) {}

        fn open_url(&self, _url: &str) {}
    }

    /// Hands out one scripted server per connect.
    struct ScriptedServer {
        script: Mutex<Option<Mock>>,
        dialed: Mutex<Vec<(String, u16)>>,
    }

    impl ScriptedServer {
        fn new(mock: Mock) -> Self {
            Self {
                script: Mutex::new(Some(mock)),
                dialed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ImapConnect for ScriptedServer {
        async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn ImapIo>> {
            self.dialed.lock().unwrap().push((host.to_string(), port));
            let mock = self.script.lock().unwrap().take().unwrap();
            Ok(Box::new(mock))
        }
    }

    struct Unused;

    #[async_trait]
    impl OAuthGateway for Unused {
        async fn refresh(&self, _stored: &StoredCredentials) -> Result<StoredCredentials> {
            unreachable!()
        }

        async fn authorize(
            &self,
            _secret: &mailtally_oauth::ClientSecret,
        ) -> Result<StoredCredentials> {
            unreachable!()
        }
    }

    #[async_trait]
    impl GmailApi for Unused {
        async fn list_messages(
            &self,
            _access_token: &str,
            _query: &str,
            _page_token: Option<&str>,
        ) -> Result<MessagePage> {
            unreachable!()
        }
    }

    fn handler(
        account: AccountDescriptor,
        store: &Arc<MemoryStore>,
        prompt: &Arc<ScriptedPrompt>,
        server: &Arc<ScriptedServer>,
    ) -> ImapMailHandler {
        let services = Services {
            secrets: store.clone(),
            prompt: prompt.clone(),
            oauth: Arc::new(Unused),
            gmail: Arc::new(Unused),
            imap: server.clone(),
            clock: Arc::new(SystemClock),
        };
        ImapMailHandler::new(account, &services)
    }

    fn icloud() -> AccountDescriptor {
        AccountDescriptor::imap("iCloud", "me@icloud.com", "imap.mail.me.com", 993)
    }

    fn session_until_search() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN me@icloud.com secret\r\n")
            .read(b"A0001 OK\r\n")
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"* 10 EXISTS\r\n")
            .read(b"A0002 OK\r\n")
            .write(b"A0003 SEARCH UNSEEN\r\n");
        builder
    }

    fn stored_password() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::default());
        store.set("me@icloud.com", "secret").unwrap();
        store
    }

    #[tokio::test]
    async fn test_counts_unseen_messages() {
        let mock = session_until_search()
            .read(b"* SEARCH 1 4 9\r\n")
            .read(b"A0003 OK\r\n")
            .write(b"A0004 LOGOUT\r\n")
            .read(b"* BYE\r\n")
            .read(b"A0004 OK\r\n")
            .build();
        let server = Arc::new(ScriptedServer::new(mock));
        let prompt = Arc::new(ScriptedPrompt::default());

        let mut handler = handler(icloud(), &stored_password(), &prompt, &server);
        assert_eq!(handler.get_unread_count().await, 3);
        assert_eq!(
            *server.dialed.lock().unwrap(),
            vec![("imap.mail.me.com".to_string(), 993)]
        );
        assert!(prompt.passwords_asked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_rejection_reports_failure_and_logs_out() {
        let mock = session_until_search()
            .read(b"A0003 NO [UNAVAILABLE] search failed\r\n")
            .write(b"A0004 LOGOUT\r\n")
            .read(b"A0004 OK\r\n")
            .build();
        let server = Arc::new(ScriptedServer::new(mock));
        let prompt = Arc::new(ScriptedPrompt::default());

        let mut handler = handler(icloud(), &stored_password(), &prompt, &server);
        assert_eq!(handler.get_unread_count().await, CHECK_FAILED);
    }

    #[tokio::test]
    async fn test_login_failure_reports_failure() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN me@icloud.com secret\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] Authentication failed\r\n")
            .write(b"A0002 LOGOUT\r\n")
            .read(b"* BYE\r\n")
            .read(b"A0002 OK\r\n")
            .build();
        let server = Arc::new(ScriptedServer::new(mock));
        let prompt = Arc::new(ScriptedPrompt::default());

        let mut handler = handler(icloud(), &stored_password(), &prompt, &server);
        assert_eq!(handler.get_unread_count().await, CHECK_FAILED);
    }

    #[tokio::test]
    async fn test_select_rejection_still_logs_out() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN me@icloud.com secret\r\n")
            .read(b"A0001 OK\r\n")
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"A0002 NO [NONEXISTENT] Unknown mailbox\r\n")
            .write(b"A0003 LOGOUT\r\n")
            .read(b"* BYE\r\n")
            .read(b"A0003 OK\r\n")
            .build();
        let server = Arc::new(ScriptedServer::new(mock));
        let prompt = Arc::new(ScriptedPrompt::default());

        let mut handler = handler(icloud(), &stored_password(), &prompt, &server);
        assert_eq!(handler.get_unread_count().await, CHECK_FAILED);
    }

    #[tokio::test]
    async fn test_missing_server_fails_without_connecting() {
        let server = Arc::new(ScriptedServer::new(Builder::new().build()));
        let prompt = Arc::new(ScriptedPrompt::default());
        let account = AccountDescriptor {
            imap_server: None,
            ..icloud()
        };

        let mut handler = handler(account, &stored_password(), &prompt, &server);
        assert_eq!(handler.get_unread_count().await, CHECK_FAILED);
        assert!(server.dialed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_port_defaults_to_993() {
        let mock = Builder::new().read(b"* BYE busy\r\n").build();
        let server = Arc::new(ScriptedServer::new(mock));
        let prompt = Arc::new(ScriptedPrompt::default());
        let account = AccountDescriptor {
            imap_port: None,
            ..icloud()
        };

        let mut handler = handler(account, &stored_password(), &prompt, &server);
        assert_eq!(handler.get_unread_count().await, CHECK_FAILED);
        assert_eq!(server.dialed.lock().unwrap()[0].1, 993);
    }

    #[test]
    fn test_password_is_prompted_once_and_stored() {
        let server = Arc::new(ScriptedServer::new(Builder::new().build()));
        let store = Arc::new(MemoryStore::default());
        let prompt = Arc::new(ScriptedPrompt::default());

        let handler = handler(icloud(), &store, &prompt, &server);
        assert_eq!(handler.get_password().unwrap(), "typed");
        assert_eq!(handler.get_password().unwrap(), "typed");

        assert_eq!(
            *prompt.passwords_asked.lock().unwrap(),
            vec!["Enter password for iCloud (me@icloud.com):"]
        );
        assert_eq!(store.get("me@icloud.com").unwrap().as_deref(), Some("typed"));
    }
}
