//! Gmail REST API: listing message ids that match a search query.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

/// `users.messages.list` for the authenticated user.
pub const MESSAGES_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages";

/// Gmail search query for unread mail.
pub const UNREAD_QUERY: &str = "is:unread";

/// Largest page the API hands out.
const PAGE_SIZE: &str = "500";

/// One page of a message listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    /// Message ids on this page.
    pub ids: Vec<String>,
    /// Token for the next page, if any.
    pub next_page_token: Option<String>,
}

/// Message listing endpoint.
#[async_trait]
pub trait GmailApi: Send + Sync {
    /// Lists one page of messages matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success response.
    async fn list_messages(
        &self,
        access_token: &str,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<MessagePage>;
}

/// Counts every message matching `query`, following pagination.
///
/// # Errors
///
/// Returns the first page error.
pub async fn count_messages(api: &dyn GmailApi, access_token: &str, query: &str) -> Result<usize> {
    let mut total = 0;
    let mut page_token: Option<String> = None;

    loop {
        let page = api
            .list_messages(access_token, query, page_token.as_deref())
            .await?;
        total += page.ids.len();
        debug!(page = page.ids.len(), total, "listed messages");

        match page.next_page_token {
            Some(next) if !next.is_empty() => page_token = Some(next),
            _ => return Ok(total),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

/// [`GmailApi`] over HTTPS.
#[derive(Debug, Clone)]
pub struct GmailRest {
    http: reqwest::Client,
    endpoint: String,
}

impl GmailRest {
    /// Client for the public Gmail endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_endpoint(MESSAGES_URL)
    }

    /// Client for a custom listing endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mailtally/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl GmailApi for GmailRest {
    async fn list_messages(
        &self,
        access_token: &str,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<MessagePage> {
        let mut request = self
            .http
            .get(&self.endpoint)
            .bearer_auth(access_token)
            .query(&[("q", query), ("maxResults", PAGE_SIZE)]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let list: ListResponse = response.json().await?;
        Ok(MessagePage {
            ids: list.messages.into_iter().map(|m| m.id).collect(),
            next_page_token: list.next_page_token,
        })
    }
}
