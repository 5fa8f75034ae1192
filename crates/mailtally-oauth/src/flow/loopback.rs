//! One-shot loopback listener for the installed-app redirect.
//!
//! The authorization server redirects the browser to
//! `http://127.0.0.1:<port>/?code=...&state=...`. We accept connections until
//! one of them carries our `state`, answer it with a short page and hand the
//! code back. There is no timeout: an unattended flow waits indefinitely.

use std::net::Ipv4Addr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

const SUCCESS_PAGE: &str = "Authorization complete. You may close this window.";
const FAILURE_PAGE: &str = "Authorization failed. Check the terminal for details.";

/// Local HTTP listener that captures a single authorization redirect.
#[derive(Debug)]
pub struct LoopbackServer {
    listener: TcpListener,
    redirect_uri: String,
}

/// What a single request to the listener turned out to be.
#[derive(Debug)]
enum Redirect {
    Code(String),
    Failed(Error),
    /// Browser noise such as `/favicon.ico`.
    Unrelated,
}

impl LoopbackServer {
    /// Binds to an ephemeral port on the IPv4 loopback interface.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let port = listener.local_addr()?.port();
        Ok(Self {
            listener,
            redirect_uri: format!("http://127.0.0.1:{port}/"),
        })
    }

    /// Returns the redirect URI to register with the authorization request.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Waits for the redirect carrying `expected_state` and returns its code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccessDenied`] or [`Error::Provider`] when the provider
    /// reports a failure, [`Error::StateMismatch`] for a forged redirect, and
    /// I/O errors from the socket.
    pub async fn wait_for_code(self, expected_state: &str) -> Result<String> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            debug!(%peer, "authorization redirect connection");

            let target = read_request_target(&mut stream).await?;
            match parse_redirect(&target, expected_state) {
                Redirect::Code(code) => {
                    respond(&mut stream, "200 OK", SUCCESS_PAGE).await;
                    return Ok(code);
                }
                Redirect::Failed(err) => {
                    respond(&mut stream, "400 Bad Request", FAILURE_PAGE).await;
                    return Err(err);
                }
                Redirect::Unrelated => {
                    respond(&mut stream, "404 Not Found", "Not found").await;
                }
            }
        }
    }
}

/// Reads the request line and drains the headers, returning the target.
async fn read_request_target(stream: &mut TcpStream) -> Result<String> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    let mut header = String::new();
    loop {
        header.clear();
        let n = reader.read_line(&mut header).await?;
        if n == 0 || header == "\r\n" || header == "\n" {
            break;
        }
    }

    // "GET /?code=... HTTP/1.1"
    Ok(request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string())
}

fn parse_redirect(target: &str, expected_state: &str) -> Redirect {
    let Ok(url) = Url::parse("http://127.0.0.1/").and_then(|base| base.join(target)) else {
        return Redirect::Unrelated;
    };
    if url.path() != "/" {
        return Redirect::Unrelated;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = String::new();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = value.into_owned(),
            _ => {}
        }
    }

    if code.is_none() && error.is_none() {
        return Redirect::Unrelated;
    }
    if state.as_deref() != Some(expected_state) {
        return Redirect::Failed(Error::StateMismatch);
    }
    match (code, error) {
        (_, Some(error)) if error == "access_denied" => Redirect::Failed(Error::AccessDenied),
        (_, Some(error)) => Redirect::Failed(Error::provider(error, description)),
        (Some(code), None) => Redirect::Code(code),
        (None, None) => Redirect::Unrelated,
    }
}

/// Best effort; the browser may already have gone away.
async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!("failed to answer redirect: {e}");
    }
    let _ = stream.shutdown().await;
}
