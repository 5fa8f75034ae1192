//! # mailtally-imap
//!
//! A small IMAP4rev1 client covering what an unread counter needs:
//! implicit-TLS connect, `LOGIN`, `SELECT`, `SEARCH` and `LOGOUT`.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailtally_imap::{Client, connect_tls};
//!
//! let stream = connect_tls("imap.example.com", 993).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = client
//!     .login("user@example.com", "password")
//!     .await
//!     .map_err(|(_, e)| e)?;
//! let (mut client, status) = client.select("INBOX").await.map_err(|(_, e)| e)?;
//! let unseen = client.search("UNSEEN").await?;
//! println!("{} of {} unseen", unseen.len(), status.exists);
//! client.logout().await?;
//! ```
//!
//! ## Connection States
//!
//! The client uses the type-state pattern so that, for example, `SEARCH`
//! cannot be issued before a mailbox is selected:
//!
//! ```text
//! NotAuthenticated ── login() ──> Authenticated ── select() ──> Selected
//! ```
//!
//! A rejected `login()` or `select()` returns the client in its previous
//! state alongside the error; `logout()` is available in every state.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;

pub use command::{Command, TagGenerator};
pub use connection::{
    Authenticated, Client, FramedStream, ImapStream, MailboxStatus, NotAuthenticated, Selected,
    Transition, connect_tls,
};
pub use error::{Error, Result};
pub use parser::{Response, Status, UntaggedResponse};
