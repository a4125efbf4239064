//! IMAP implementation of [`Connector`] and [`MailSession`] on top of the
//! `imap` and `native-tls` crates.
//!
//! # Certificate validation
//!
//! Both implicit TLS and STARTTLS run with certificate and hostname
//! validation **disabled**. Hosted mailbox providers frequently serve
//! self-signed certificates or certificates for a different hostname than
//! the one the account was told to use, and this tool only ever reads mail
//! with the account's own credentials. The relaxation is confined to this
//! connector; nothing else in the crate opens TLS connections.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use native_tls::{TlsConnector, TlsStream};
use tracing::debug;

use super::connect::{ConnectError, FailureStage, ServerCandidate};
use super::{Connector, MailSession};
use crate::error::{HarvestError, Result};

/// `LIST` over the whole hierarchy.
const LIST_ALL: &str = "LIST \"\" \"*\"";

/// Opens real IMAP sessions.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    timeout: Duration,
}

impl ImapConnector {
    /// `timeout` bounds TCP connect and every subsequent socket read/write.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Connector for ImapConnector {
    type Session = ImapSession;

    fn connect(
        &self,
        candidate: &ServerCandidate,
        user: &str,
        password: &str,
    ) -> std::result::Result<ImapSession, ConnectError> {
        let tcp = open_tcp(&candidate.host, candidate.port, self.timeout)
            .map_err(|e| ConnectError::new(FailureStage::Transport, e))?;
        let tls = relaxed_tls().map_err(|e| ConnectError::new(FailureStage::Handshake, e))?;

        let client = if candidate.secure {
            let stream = tls
                .connect(&candidate.host, tcp)
                .map_err(|e| ConnectError::new(FailureStage::Handshake, e))?;
            let mut client = imap::Client::new(stream);
            client
                .read_greeting()
                .map_err(|e| ConnectError::new(FailureStage::Transport, e))?;
            client
        } else {
            let mut client = imap::Client::new(tcp);
            client
                .read_greeting()
                .map_err(|e| ConnectError::new(FailureStage::Transport, e))?;
            client
                .secure(&candidate.host, &tls)
                .map_err(|e| ConnectError::new(FailureStage::Handshake, e))?
        };

        let session = client
            .login(user, password)
            .map_err(|(e, _)| ConnectError::new(FailureStage::Authentication, e))?;

        Ok(ImapSession { inner: session })
    }
}

/// Resolve `host` and connect to the first address that answers in time.
fn open_tcp(host: &str, port: u16, timeout: Duration) -> std::io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        debug!(%addr, "Opening TCP connection");
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no addresses found for {host}"),
        )
    }))
}

/// TLS connector that accepts any certificate. See the module docs.
fn relaxed_tls() -> std::result::Result<TlsConnector, native_tls::Error> {
    TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
}

/// An authenticated IMAP session over TLS.
pub struct ImapSession {
    inner: imap::Session<TlsStream<TcpStream>>,
}

impl MailSession for ImapSession {
    fn list_folders(&mut self) -> Result<Vec<String>> {
        let raw = self.inner.run_command_and_read_response(LIST_ALL)?;
        Ok(String::from_utf8_lossy(&raw)
            .lines()
            .map(str::to_string)
            .collect())
    }

    fn examine(&mut self, folder: &str) -> Result<u32> {
        let mailbox = self.inner.examine(folder)?;
        Ok(mailbox.exists)
    }

    fn search_all(&mut self) -> Result<Vec<u32>> {
        let mut ids: Vec<u32> = self.inner.search("ALL")?.into_iter().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn fetch_raw(&mut self, id: u32) -> Result<Vec<u8>> {
        let fetches = self.inner.fetch(id.to_string(), "RFC822")?;
        fetches
            .iter()
            .find_map(|f| f.body())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| HarvestError::Session(format!("no RFC822 body returned for {id}")))
    }

    fn logout(&mut self) -> Result<()> {
        self.inner.logout()?;
        Ok(())
    }
}
