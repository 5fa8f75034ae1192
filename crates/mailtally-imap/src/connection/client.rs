//! Type-state IMAP client.
//!
//! A connection moves `NotAuthenticated` → `Authenticated` → `Selected`.
//! Transitions consume the client. A failed LOGIN or SELECT hands the
//! client back in its previous state, so the caller can still log out.

use std::marker::PhantomData;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, Status, UntaggedResponse};
use crate::{Error, Result};

/// Connected, greeting received, not logged in.
#[derive(Debug)]
pub struct NotAuthenticated;

/// Logged in, no mailbox selected.
#[derive(Debug)]
pub struct Authenticated;

/// A mailbox is selected.
#[derive(Debug)]
pub struct Selected;

/// Counters reported by SELECT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Number of messages with the `\Recent` flag.
    pub recent: u32,
}

/// Result of a state transition: the next client, or the unchanged client
/// together with the error.
pub type Transition<Next, Prev> = std::result::Result<Next, (Prev, Error)>;

/// IMAP client with its connection state tracked in the type.
pub struct Client<S, State> {
    stream: FramedStream<S>,
    tags: TagGenerator,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tags: self.tags,
            _state: PhantomData,
        }
    }

    /// Sends `command` and returns every response up to and including its
    /// tagged completion, failing unless that completion is OK.
    async fn execute(&mut self, command: &Command) -> Result<Vec<Response>> {
        let tag = self.tags.next_tag();
        trace!(tag = %tag, command = command.name(), "sending command");
        self.stream.write_command(&command.serialize(&tag)).await?;

        let raw = self.stream.read_until_tagged(&tag).await?;
        let responses = raw
            .iter()
            .map(|bytes| Response::parse(bytes))
            .collect::<Result<Vec<_>>>()?;
        check_tagged_ok(&responses, &tag)?;
        Ok(responses)
    }

    /// Logs out. Valid in every state.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects LOGOUT. A socket closed
    /// right after BYE is not an error.
    pub async fn logout(mut self) -> Result<()> {
        match self.execute(&Command::Logout).await {
            Ok(_) | Err(Error::Io(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bye`] if the server refuses the connection, or an
    /// I/O or parse error if the greeting cannot be read.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut stream = FramedStream::new(stream);
        let greeting = Response::parse(&stream.read_response().await?)?;

        match greeting {
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Ok | Status::PreAuth,
                text,
            }) => debug!(greeting = %text, "server greeting"),
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Bye,
                text,
            }) => return Err(Error::Bye(text)),
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        }

        Ok(Self {
            stream,
            tags: TagGenerator::default(),
            _state: PhantomData,
        })
    }

    /// Logs in with a username and password.
    ///
    /// # Errors
    ///
    /// Returns the client with [`Error::No`] when the credentials are
    /// rejected.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Transition<Client<S, Authenticated>, Self> {
        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.execute(&command).await {
            Ok(_) => Ok(self.transition()),
            Err(e) => Err((self, e)),
        }
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Selects a mailbox.
    ///
    /// # Errors
    ///
    /// Returns the client with [`Error::No`] if the mailbox does not exist
    /// or cannot be opened.
    pub async fn select(
        mut self,
        mailbox: &str,
    ) -> Transition<(Client<S, Selected>, MailboxStatus), Self> {
        let command = Command::Select {
            mailbox: mailbox.to_string(),
        };
        let responses = match self.execute(&command).await {
            Ok(responses) => responses,
            Err(e) => return Err((self, e)),
        };

        let mut status = MailboxStatus::default();
        for response in responses {
            match response {
                Response::Untagged(UntaggedResponse::Exists(n)) => status.exists = n,
                Response::Untagged(UntaggedResponse::Recent(n)) => status.recent = n,
                _ => {}
            }
        }

        Ok((self.transition(), status))
    }
}

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Runs SEARCH with raw criteria and returns the matching sequence numbers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::No`] or [`Error::Bad`] if the server rejects the search.
    pub async fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        let responses = self
            .execute(&Command::Search {
                criteria: criteria.to_string(),
            })
            .await?;

        Ok(responses
            .into_iter()
            .filter_map(|response| match response {
                Response::Untagged(UntaggedResponse::Search(ids)) => Some(ids),
                _ => None,
            })
            .flatten()
            .collect())
    }
}

fn check_tagged_ok(responses: &[Response], tag: &str) -> Result<()> {
    for response in responses.iter().rev() {
        if let Response::Tagged {
            tag: resp_tag,
            status,
            text,
        } = response
            && resp_tag == tag
        {
            return match status {
                Status::Ok | Status::PreAuth => Ok(()),
                Status::No => Err(Error::No(text.clone())),
                Status::Bad => Err(Error::Bad(text.clone())),
                Status::Bye => Err(Error::Bye(text.clone())),
            };
        }
    }

    Err(Error::Protocol("missing tagged response".to_string()))
}
