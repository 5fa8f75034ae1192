//! Account descriptors, configuration file and password storage.

pub mod config;
pub mod credentials;
mod model;

pub use credentials::{CredentialError, CredentialResult, KeyringStore, SecretStore};
pub use model::{AccountDescriptor, DEFAULT_IMAP_PORT, HandlerKind, OAUTH_MAIL_TYPE};
