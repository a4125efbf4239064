//! Mail-retrieval session: the capability interface the pipeline runs
//! against, plus the IMAP implementation of it.
//!
//! The pipeline never touches a socket directly. It sees a [`Connector`]
//! that turns a [`ServerCandidate`](connect::ServerCandidate) into an
//! authenticated [`MailSession`], so tests can substitute an in-memory double.

pub mod connect;
pub mod fetch;
pub mod folders;
pub mod imap_backend;

use crate::error::{HarvestError, Result};

pub use connect::{CandidateFailure, ConnectError, FailureStage, ServerCandidate};

/// An authenticated, stateful mail session.
pub trait MailSession {
    /// Issue `LIST "" "*"` and return the raw reply, one line per element.
    fn list_folders(&mut self) -> Result<Vec<String>>;

    /// Open `folder` read-only (`EXAMINE`) and return its message count.
    fn examine(&mut self, folder: &str) -> Result<u32>;

    /// `SEARCH ALL` in the selected folder. Sequence numbers in ascending order.
    fn search_all(&mut self) -> Result<Vec<u32>>;

    /// Retrieve the complete raw message (`RFC822`) for one sequence number.
    fn fetch_raw(&mut self, id: u32) -> Result<Vec<u8>>;

    /// End the session.
    fn logout(&mut self) -> Result<()>;
}

/// Opens and authenticates a session against one server candidate.
pub trait Connector {
    type Session: MailSession;

    fn connect(
        &self,
        candidate: &ServerCandidate,
        user: &str,
        password: &str,
    ) -> std::result::Result<Self::Session, ConnectError>;
}

/// Account identity and secret.
#[derive(Clone, Default)]
pub struct Credentials {
    pub user: String,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: Option<String>) -> Self {
        Self {
            user: user.into(),
            password,
        }
    }

    /// The password, or [`HarvestError::CredentialMissing`] if none (or an
    /// empty one) was supplied.
    pub fn secret(&self) -> Result<&str> {
        match self.password.as_deref() {
            Some(p) if !p.is_empty() => Ok(p),
            _ => Err(HarvestError::CredentialMissing {
                user: self.user.clone(),
            }),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
