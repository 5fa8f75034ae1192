//! # mailtally-oauth
//!
//! `OAuth2` support for the Gmail side of `mailtally`.
//!
//! ## Features
//!
//! - **Authorization Code Flow** with PKCE, completed through a one-shot
//!   loopback listener on `localhost`
//! - **Token lifecycle**: expiry checks against an injectable [`Clock`] and a
//!   small state machine deciding between use, refresh and re-authorization
//! - **Client secrets**: parsing of the Google Cloud Console `credentials.json`
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailtally_oauth::{AuthorizationCodeFlow, ClientSecret, LoopbackServer};
//!
//! let secret = ClientSecret::load("credentials.json")?;
//! let server = LoopbackServer::bind().await?;
//! let client = secret.client()?.with_redirect_uri(server.redirect_uri());
//! let flow = AuthorizationCodeFlow::new(client).with_pkce();
//!
//! let state = mailtally_oauth::flow::random_state();
//! println!("Visit: {}", flow.authorization_url(None, Some(&state))?);
//!
//! let code = server.wait_for_code(&state).await?;
//! let token = flow.exchange_code(&code, None).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod flow;
pub mod provider;
pub mod secret;
pub mod token;

pub use error::{Error, Result};
pub use flow::{AuthorizationCodeFlow, LoopbackServer, OAuthClient, PkceChallenge};
pub use provider::Provider;
pub use secret::ClientSecret;
pub use token::{Clock, SystemClock, Token, TokenAction, TokenState};
