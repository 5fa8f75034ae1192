//! Gmail accounts checked through the REST API with `OAuth2`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use mailtally_oauth::flow::random_state;
use mailtally_oauth::{AuthorizationCodeFlow, ClientSecret, Clock, LoopbackServer, TokenAction, TokenState};
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use super::gmail::{self, GmailApi, UNREAD_QUERY};
use super::token_store::{StoredCredentials, TokenStore};
use super::{CHECK_FAILED, MailHandler, Services, to_count};
use crate::account::{AccountDescriptor, HandlerKind};
use crate::paths::Paths;
use crate::prompt::Prompt;
use crate::{Error, Result};

/// Obtains tokens from the authorization server.
#[async_trait]
pub trait OAuthGateway: Send + Sync {
    /// Exchanges the stored refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token endpoint rejects the refresh.
    async fn refresh(&self, stored: &StoredCredentials) -> Result<StoredCredentials>;

    /// Runs the interactive browser authorization for `secret`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operator denies access or the exchange fails.
    async fn authorize(&self, secret: &ClientSecret) -> Result<StoredCredentials>;
}

/// [`OAuthGateway`] for Google, completing authorization on a loopback port.
pub struct GoogleGateway {
    prompt: Arc<dyn Prompt>,
}

impl GoogleGateway {
    /// Gateway that sends the operator to the consent page through `prompt`.
    #[must_use]
    pub fn new(prompt: Arc<dyn Prompt>) -> Self {
        Self { prompt }
    }
}

#[async_trait]
impl OAuthGateway for GoogleGateway {
    async fn refresh(&self, stored: &StoredCredentials) -> Result<StoredCredentials> {
        let token = stored.client()?.refresh_token(&stored.token).await?;
        Ok(StoredCredentials {
            token,
            ..stored.clone()
        })
    }

    async fn authorize(&self, secret: &ClientSecret) -> Result<StoredCredentials> {
        let server = LoopbackServer::bind().await?;
        let client = secret.client()?.with_redirect_uri(server.redirect_uri());
        let flow = AuthorizationCodeFlow::new(client).with_pkce();

        let state = random_state();
        let url = flow.authorization_url(None, Some(&state))?;
        self.prompt.open_url(url.as_str());

        let code = server.wait_for_code(&state).await?;
        let token = flow.exchange_code(&code, None).await?;
        Ok(StoredCredentials::new(token, secret))
    }
}

/// Handler for `oauth_mail` accounts.
pub struct OAuthMailHandler {
    account: AccountDescriptor,
    tokens: TokenStore,
    client_secret_path: PathBuf,
    gateway: Arc<dyn OAuthGateway>,
    gmail: Arc<dyn GmailApi>,
    prompt: Arc<dyn Prompt>,
    clock: Arc<dyn Clock>,
    session: Option<StoredCredentials>,
    span: Span,
}

impl OAuthMailHandler {
    /// Creates a handler; nothing is loaded until the first check.
    #[must_use]
    pub fn new(account: AccountDescriptor, paths: &Paths, services: &Services) -> Self {
        let span = info_span!("account", name = %account.name, kind = "oauth_mail");
        Self {
            tokens: TokenStore::new(paths.token_for(&account.email)),
            client_secret_path: paths.credentials(),
            gateway: Arc::clone(&services.oauth),
            gmail: Arc::clone(&services.gmail),
            prompt: Arc::clone(&services.prompt),
            clock: Arc::clone(&services.clock),
            session: None,
            account,
            span,
        }
    }

    /// Makes sure a usable token is held, refreshing or re-authorizing as
    /// needed. Returns false if no token could be obtained.
    pub async fn authenticate(&mut self) -> bool {
        let span = self.span.clone();
        async {
            match self.acquire().await {
                Ok(credentials) => {
                    self.session = Some(credentials);
                    true
                }
                Err(Error::MissingClientSecret(path)) => {
                    error!(
                        "Missing credentials.json. Download it from Google Cloud Console to {}",
                        path.display()
                    );
                    self.prompt.notice(&format!(
                        "Please download credentials.json from Google Cloud Console and place it at {}",
                        path.display()
                    ));
                    false
                }
                Err(e) => {
                    error!("Authentication failed for {}: {e}", self.account.name);
                    false
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn acquire(&self) -> Result<StoredCredentials> {
        let stored = self.tokens.load();
        let state = TokenState::classify(stored.as_ref().map(|s| &s.token), self.clock.as_ref());
        debug!(?state, "stored token classified");

        let credentials = match (stored, state.action()) {
            (Some(stored), TokenAction::Use) => stored,
            (Some(stored), TokenAction::Refresh) => {
                info!("Refreshing access token for {}", self.account.email);
                match self.gateway.refresh(&stored).await {
                    Ok(credentials) => credentials,
                    Err(e) if is_revoked(&e) => {
                        warn!("Refresh token for {} was revoked: {e}", self.account.email);
                        self.authorize().await?
                    }
                    Err(e) => return Err(e),
                }
            }
            _ => self.authorize().await?,
        };

        self.tokens.save(&credentials)?;
        Ok(credentials)
    }

    async fn authorize(&self) -> Result<StoredCredentials> {
        let secret = self.client_secret()?;
        info!("Authorizing {} in the browser", self.account.email);
        self.gateway.authorize(&secret).await
    }

    fn client_secret(&self) -> Result<ClientSecret> {
        if !self.client_secret_path.exists() {
            return Err(Error::MissingClientSecret(self.client_secret_path.clone()));
        }
        Ok(ClientSecret::load(&self.client_secret_path)?)
    }

    async fn count_unread(&mut self) -> i64 {
        if self.session.is_none() && !self.authenticate().await {
            return CHECK_FAILED;
        }
        let Some(session) = &self.session else {
            return CHECK_FAILED;
        };

        match gmail::count_messages(self.gmail.as_ref(), &session.token.access_token, UNREAD_QUERY)
            .await
        {
            Ok(count) => {
                info!("{}: {count} unread messages", self.account.name);
                to_count(count)
            }
            Err(e) => {
                error!("Error getting unread count for {}: {e}", self.account.name);
                CHECK_FAILED
            }
        }
    }
}

/// Google answers `invalid_grant` once a refresh token is revoked or has
/// expired; only a new authorization helps.
fn is_revoked(error: &Error) -> bool {
    matches!(
        error,
        Error::OAuth(mailtally_oauth::Error::Provider { code, .. }) if code == "invalid_grant"
    )
}

#[async_trait]
impl MailHandler for OAuthMailHandler {
    fn account(&self) -> &AccountDescriptor {
        &self.account
    }

    fn kind(&self) -> HandlerKind {
        HandlerKind::OAuth
    }

    async fn get_unread_count(&mut self) -> i64 {
        let span = self.span.clone();
        self.count_unread().instrument(span).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use mailtally_oauth::Token;

    use super::*;
    use crate::account::{CredentialResult, SecretStore};
    use crate::handler::{ImapConnect, ImapIo, MessagePage};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[derive(Default)]
    struct RecordingGateway {
        refreshes: AtomicUsize,
        authorizations: AtomicUsize,
        revoked: bool,
    }

    #[async_trait]
    impl OAuthGateway for RecordingGateway {
        async fn refresh(&self, stored: &StoredCredentials) -> Result<StoredCredentials> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.revoked {
                return Err(mailtally_oauth::Error::provider(
                    "invalid_grant",
                    "Token has been expired or revoked.",
                )
                .into());
            }
            Ok(StoredCredentials {
                token: Token::new("refreshed", "Bearer")
                    .with_expires_at(now() + Duration::hours(1))
                    .with_refresh_token(stored.token.refresh_token.clone().unwrap()),
                ..stored.clone()
            })
        }

        async fn authorize(&self, secret: &ClientSecret) -> Result<StoredCredentials> {
            self.authorizations.fetch_add(1, Ordering::SeqCst);
            Ok(StoredCredentials::new(
                Token::new("authorized", "Bearer").with_refresh_token("r"),
                secret,
            ))
        }
    }

    struct FixedGmail {
        result: Mutex<Option<Result<MessagePage>>>,
        tokens_seen: Mutex<Vec<String>>,
    }

    impl FixedGmail {
        fn ok(ids: usize) -> Self {
            let ids = (0..ids).map(|i| i.to_string()).collect();
            Self {
                result: Mutex::new(Some(Ok(MessagePage {
                    ids,
                    next_page_token: None,
                }))),
                tokens_seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                result: Mutex::new(Some(Err(Error::Api {
                    status: 401,
                    message: "Invalid Credentials".into(),
                }))),
                tokens_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GmailApi for FixedGmail {
        async fn list_messages(
            &self,
            access_token: &str,
            _query: &str,
            _page_token: Option<&str>,
        ) -> Result<MessagePage> {
            self.tokens_seen.lock().unwrap().push(access_token.to_string());
            self.result.lock().unwrap().take().unwrap()
        }
    }

    #[derive(Default)]
    struct Notices(Mutex<Vec<String>>);

    impl Prompt for Notices {
        fn password(&self, _message: &str) -> io::Result<String> {
            panic!("OAuth accounts never ask for a password")
        }

        fn confirm(&self, _question: &str) -> io::Result<bool> {
            panic!("unexpected confirmation")
        }

        fn notice(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }

        fn open_url(&self, _url: &str) {}
    }

    struct NoSecrets;

    impl SecretStore for NoSecrets {
        fn get(&self, _account: &str) -> CredentialResult<Option<String>> {
            panic!("keyring must not be used for OAuth accounts")
        }

        fn set(&self, _account: &str, _secret: &str) -> CredentialResult<()> {
            panic!("keyring must not be used for OAuth accounts")
        }
    }

    struct NoImap;

    #[async_trait]
    impl ImapConnect for NoImap {
        async fn connect(&self, _host: &str, _port: u16) -> Result<Box<dyn ImapIo>> {
            panic!("IMAP must not be used for OAuth accounts")
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        paths: Paths,
        gateway: Arc<RecordingGateway>,
        gmail: Arc<FixedGmail>,
        prompt: Arc<Notices>,
    }

    impl Fixture {
        fn new(gmail: FixedGmail) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let paths = Paths::new(dir.path());
            paths.ensure_dirs().unwrap();
            Self {
                _dir: dir,
                paths,
                gateway: Arc::new(RecordingGateway::default()),
                gmail: Arc::new(gmail),
                prompt: Arc::new(Notices::default()),
            }
        }

        fn with_revoked_refresh(mut self) -> Self {
            self.gateway = Arc::new(RecordingGateway {
                revoked: true,
                ..RecordingGateway::default()
            });
            self
        }

        fn handler(&self) -> OAuthMailHandler {
            let services = Services {
                secrets: Arc::new(NoSecrets),
                prompt: self.prompt.clone(),
                oauth: self.gateway.clone(),
                gmail: self.gmail.clone(),
                imap: Arc::new(NoImap),
                clock: Arc::new(FixedClock(now())),
            };
            OAuthMailHandler::new(
                AccountDescriptor::oauth("Gmail", "me@gmail.com"),
                &self.paths,
                &services,
            )
        }

        fn store_token(&self, token: Token) {
            TokenStore::new(self.paths.token_for("me@gmail.com"))
                .save(&StoredCredentials {
                    token,
                    client_id: "cid".into(),
                    client_secret: None,
                    token_url: "https://oauth2.googleapis.com/token".into(),
                })
                .unwrap();
        }

        fn write_client_secret(&self) {
            std::fs::write(
                self.paths.credentials(),
                r#"{"installed":{"client_id":"cid","client_secret":"shh"}}"#,
            )
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_valid_token_is_used_as_is() {
        let fixture = Fixture::new(FixedGmail::ok(3));
        fixture.store_token(Token::new("stored", "Bearer").with_expires_at(now() + Duration::hours(1)));

        let mut handler = fixture.handler();
        assert_eq!(handler.get_unread_count().await, 3);
        assert_eq!(*fixture.gmail.tokens_seen.lock().unwrap(), vec!["stored"]);
        assert_eq!(fixture.gateway.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(fixture.gateway.authorizations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_persisted() {
        let fixture = Fixture::new(FixedGmail::ok(0));
        fixture.store_token(
            Token::new("old", "Bearer")
                .with_expires_at(now() - Duration::minutes(1))
                .with_refresh_token("r"),
        );

        let mut handler = fixture.handler();
        assert_eq!(handler.get_unread_count().await, 0);
        assert_eq!(fixture.gateway.refreshes.load(Ordering::SeqCst), 1);

        let saved = TokenStore::new(fixture.paths.token_for("me@gmail.com"))
            .load()
            .unwrap();
        assert_eq!(saved.token.access_token, "refreshed");
        assert_eq!(saved.client_id, "cid");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_valid_token_is_saved_again() {
        use std::os::unix::fs::PermissionsExt;

        let fixture = Fixture::new(FixedGmail::ok(1));
        fixture.store_token(Token::new("stored", "Bearer").with_expires_at(now() + Duration::hours(1)));
        let path = fixture.paths.token_for("me@gmail.com");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let mut handler = fixture.handler();
        assert!(handler.authenticate().await);

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let saved = TokenStore::new(path).load().unwrap();
        assert_eq!(saved.token.access_token, "stored");
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_falls_back_to_authorization() {
        let fixture = Fixture::new(FixedGmail::ok(5)).with_revoked_refresh();
        fixture.write_client_secret();
        fixture.store_token(
            Token::new("old", "Bearer")
                .with_expires_at(now() - Duration::minutes(1))
                .with_refresh_token("revoked"),
        );

        let mut handler = fixture.handler();
        assert_eq!(handler.get_unread_count().await, 5);
        assert_eq!(fixture.gateway.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(fixture.gateway.authorizations.load(Ordering::SeqCst), 1);

        let saved = TokenStore::new(fixture.paths.token_for("me@gmail.com"))
            .load()
            .unwrap();
        assert_eq!(saved.token.access_token, "authorized");
    }

    #[tokio::test]
    async fn test_missing_token_runs_authorization() {
        let fixture = Fixture::new(FixedGmail::ok(2));
        fixture.write_client_secret();

        let mut handler = fixture.handler();
        assert!(handler.authenticate().await);
        assert_eq!(fixture.gateway.authorizations.load(Ordering::SeqCst), 1);
        assert_eq!(handler.get_unread_count().await, 2);

        let saved = TokenStore::new(fixture.paths.token_for("me@gmail.com"))
            .load()
            .unwrap();
        assert_eq!(saved.client_secret.as_deref(), Some("shh"));
    }

    #[tokio::test]
    async fn test_missing_client_secret_fails_softly() {
        let fixture = Fixture::new(FixedGmail::ok(2));

        let mut handler = fixture.handler();
        assert_eq!(handler.get_unread_count().await, CHECK_FAILED);
        assert_eq!(fixture.gateway.authorizations.load(Ordering::SeqCst), 0);
        assert!(fixture.gmail.tokens_seen.lock().unwrap().is_empty());

        let notices = fixture.prompt.0.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("credentials.json"));
    }

    #[tokio::test]
    async fn test_corrupt_token_triggers_authorization() {
        let fixture = Fixture::new(FixedGmail::ok(1));
        fixture.write_client_secret();
        std::fs::write(fixture.paths.token_for("me@gmail.com"), "garbage").unwrap();

        let mut handler = fixture.handler();
        assert_eq!(handler.get_unread_count().await, 1);
        assert_eq!(fixture.gateway.authorizations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_api_error_reports_failure() {
        let fixture = Fixture::new(FixedGmail::failing());
        fixture.store_token(Token::new("stored", "Bearer"));

        let mut handler = fixture.handler();
        assert_eq!(handler.get_unread_count().await, CHECK_FAILED);
    }
}
