//! `config.json`: the list of accounts to check.
//!
//! A missing file is replaced by a template the operator is expected to
//! edit. [`is_placeholder`] recognizes the untouched template.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{info, warn};

use super::AccountDescriptor;
use crate::paths::write_with_mode;
use crate::{Error, Result};

/// Email of the first template account.
pub const PLACEHOLDER_EMAIL: &str = "your.email@gmail.com";

/// Accounts written to a fresh `config.json`.
#[must_use]
pub fn template() -> Vec<AccountDescriptor> {
    vec![
        AccountDescriptor::oauth("Gmail 1", PLACEHOLDER_EMAIL),
        AccountDescriptor::oauth("Gmail 2", "your.second.email@gmail.com"),
        AccountDescriptor::imap("iCloud", "your.email@icloud.com", "imap.mail.me.com", 993),
    ]
}

/// Returns true while the first account still carries the template address.
#[must_use]
pub fn is_placeholder(accounts: &[AccountDescriptor]) -> bool {
    accounts
        .first()
        .is_some_and(|account| account.email == PLACEHOLDER_EMAIL)
}

/// Loads the account list, writing the template first if the file is absent.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file is not a valid account list, or an
/// I/O error if it cannot be read or the template cannot be written.
pub fn load_or_init(path: &Path) -> Result<Vec<AccountDescriptor>> {
    match std::fs::read_to_string(path) {
        Ok(json) => serde_json::from_str(&json).map_err(|e| {
            Error::Config(format!("{} is not a valid account list: {e}", path.display()))
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("Config file not found, creating template at {}", path.display());
            let accounts = template();
            let json = serde_json::to_vec_pretty(&accounts)?;
            write_with_mode(path, &json, 0o600)?;
            warn!("Please edit the config file with your actual email accounts");
            Ok(accounts)
        }
        Err(e) => Err(e.into()),
    }
}
