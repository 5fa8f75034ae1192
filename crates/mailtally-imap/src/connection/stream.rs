//! TLS stream for IMAP connections.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use crate::Result;

/// An implicit-TLS IMAP connection.
pub type ImapStream = TlsStream<TcpStream>;

/// Creates a TLS connector trusting the Mozilla root set.
///
/// # Errors
///
/// Returns an error if the ring provider rejects the default protocol versions.
pub fn create_tls_connector() -> Result<TlsConnector> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Connects to `host:port` with TLS from the start.
///
/// # Errors
///
/// Returns an error if the TCP connection or the TLS handshake fails.
pub async fn connect_tls(host: &str, port: u16) -> Result<ImapStream> {
    let tcp = TcpStream::connect((host, port)).await?;
    debug!(host, port, "TCP connected, starting TLS handshake");

    let connector = create_tls_connector()?;
    let server_name = ServerName::try_from(host.to_string())?;
    Ok(connector.connect(server_name, tcp).await?)
}
