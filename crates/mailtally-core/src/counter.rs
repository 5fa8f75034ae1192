//! Account registry: builds one handler per configured account, checks them
//! in order and persists the outcome.

use std::io::Write;

use chrono::{Local, NaiveDateTime};
use indexmap::IndexMap;
use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::Result;
use crate::account::{AccountDescriptor, HandlerKind, config};
use crate::handler::{self, CHECK_FAILED, MailHandler, Services};
use crate::paths::Paths;
use crate::results::{CheckResult, ResultDocument};

/// Checks every configured account.
pub struct EmailCounter {
    paths: Paths,
    accounts: Vec<AccountDescriptor>,
    handlers: IndexMap<String, Box<dyn MailHandler>>,
    services: Services,
    span: Span,
}

impl EmailCounter {
    /// Prepares the config root, loads (or bootstraps) `config.json` and
    /// builds the handlers.
    ///
    /// An account whose name repeats an earlier one replaces that handler
    /// but keeps the earlier position.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created or the
    /// configuration cannot be loaded.
    pub fn new(paths: Paths, services: Services) -> Result<Self> {
        let span = info_span!("counter", root = %paths.root().display());
        let (accounts, handlers) = span.in_scope(|| -> Result<_> {
            paths.ensure_dirs()?;
            let accounts = config::load_or_init(&paths.config())?;

            let mut handlers = IndexMap::with_capacity(accounts.len());
            for account in &accounts {
                let built = handler::build(account.clone(), &paths, &services);
                let previous = handlers.insert(account.name.clone(), built);
                if previous.is_some() {
                    warn!("Duplicate account name {}, later entry wins", account.name);
                }
            }
            debug!(accounts = handlers.len(), "handlers ready");
            Ok((accounts, handlers))
        })?;

        Ok(Self {
            paths,
            accounts,
            handlers,
            services,
            span,
        })
    }

    /// Configured accounts, as listed in `config.json`.
    #[must_use]
    pub fn accounts(&self) -> &[AccountDescriptor] {
        &self.accounts
    }

    /// File layout in use.
    #[must_use]
    pub const fn paths(&self) -> &Paths {
        &self.paths
    }

    /// True while `config.json` is still the untouched template.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        config::is_placeholder(&self.accounts)
    }

    /// Handler type chosen for the account called `name`.
    #[must_use]
    pub fn handler_kind(&self, name: &str) -> Option<HandlerKind> {
        self.handlers.get(name).map(|handler| handler.kind())
    }

    /// Checks each account in turn. A failing account reports
    /// [`CHECK_FAILED`] and never stops the others.
    pub async fn check_all_accounts(&mut self) -> CheckResult {
        let span = self.span.clone();
        let handlers = &mut self.handlers;
        async move {
            let mut results = CheckResult::with_capacity(handlers.len());
            for (name, handler) in handlers.iter_mut() {
                debug!("Checking {name}");
                let count = handler.get_unread_count().await.max(CHECK_FAILED);
                results.insert(name.clone(), count);
            }
            info!(accounts = results.len(), "All accounts checked");
            results
        }
        .instrument(span)
        .await
    }

    /// Writes `results` stamped with the current local time.
    ///
    /// # Errors
    ///
    /// Returns an error if the results file cannot be written.
    pub fn save_results(&self, results: CheckResult) -> Result<ResultDocument> {
        self.save_results_at(results, Local::now().naive_local())
    }

    /// Writes `results` stamped with `at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the results file cannot be written.
    pub fn save_results_at(
        &self,
        results: CheckResult,
        at: NaiveDateTime,
    ) -> Result<ResultDocument> {
        let document = ResultDocument::new(results, at);
        let path = self.paths.results();
        document.write(&path)?;
        self.span.in_scope(|| info!("Results saved to {}", path.display()));
        Ok(document)
    }

    /// Walks the IMAP accounts and lets the operator replace stored
    /// passwords.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal, `out` or the keyring fails.
    pub fn configure_passwords(&self, out: &mut dyn Write) -> Result<()> {
        let prompt = &self.services.prompt;
        writeln!(out, "Setting up passwords for email accounts in keyring")?;

        for account in &self.accounts {
            if account.handler_kind() == HandlerKind::OAuth {
                continue;
            }

            writeln!(out, "\nAccount: {} ({})", account.name, account.email)?;
            out.flush()?;
            if !prompt.confirm("Do you want to update the password for this account? (y/n): ")? {
                continue;
            }

            let password = prompt.password("Enter new password:")?;
            self.services.secrets.set(&account.email, &password)?;
            writeln!(out, "Password updated for {}", account.email)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for EmailCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailCounter")
            .field("paths", &self.paths)
            .field("accounts", &self.accounts)
            .finish_non_exhaustive()
    }
}
