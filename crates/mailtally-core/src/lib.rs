//! # mailtally-core
//!
//! Core logic for `mailtally`.
//!
//! This crate provides:
//! - Account descriptors and the `config.json` bootstrap
//! - Keyring-backed password storage for IMAP accounts
//! - The [`MailHandler`] capability with Gmail (OAuth) and IMAP variants
//! - [`EmailCounter`], which checks every account and persists the results
//! - The result store and the report formatting shared by both binaries

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod counter;
mod error;
pub mod handler;
pub mod paths;
pub mod prompt;
pub mod report;
pub mod results;

pub use account::{
    AccountDescriptor, CredentialError, CredentialResult, HandlerKind, KeyringStore, SecretStore,
};
pub use counter::EmailCounter;
pub use error::{Error, Result};
pub use handler::{CHECK_FAILED, MailHandler, Services};
pub use paths::Paths;
pub use prompt::{Prompt, TerminalPrompt};
pub use results::{CheckResult, ResultDocument, StoredResults};
