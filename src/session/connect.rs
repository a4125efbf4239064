//! Connection manager: first server candidate that authenticates wins.
//!
//! This resolves an ambiguous server configuration once per run. It is not a
//! retry mechanism: each candidate is tried exactly once, in order.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Connector, Credentials};
use crate::error::{HarvestError, Result};

/// Implicit-TLS IMAP port.
pub const IMAPS_PORT: u16 = 993;
/// Plain IMAP port, upgraded with STARTTLS.
pub const IMAP_PORT: u16 = 143;

/// One endpoint to try.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCandidate {
    pub host: String,
    pub port: u16,
    /// `true`: TLS from the first byte. `false`: plain connect, then STARTTLS.
    pub secure: bool,
}

impl ServerCandidate {
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
        }
    }
}

impl fmt::Display for ServerCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.secure { "tls" } else { "starttls" };
        write!(f, "{}:{} ({mode})", self.host, self.port)
    }
}

/// Where a candidate attempt stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureStage {
    /// TCP connect, greeting, or timeout.
    Transport,
    /// TLS handshake or STARTTLS upgrade.
    Handshake,
    /// LOGIN rejected.
    Authentication,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transport => "transport",
            Self::Handshake => "handshake",
            Self::Authentication => "authentication",
        })
    }
}

/// Failure reported by a [`Connector`] for a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectError {
    pub stage: FailureStage,
    pub reason: String,
}

impl ConnectError {
    pub fn new(stage: FailureStage, reason: impl fmt::Display) -> Self {
        Self {
            stage,
            reason: reason.to_string(),
        }
    }
}

/// Why one candidate was rejected. Collected into
/// [`HarvestError::ConnectionExhausted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateFailure {
    pub candidate: ServerCandidate,
    pub stage: FailureStage,
    pub reason: String,
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} failed: {}", self.candidate, self.stage, self.reason)
    }
}

/// Try each candidate in order and return the first authenticated session.
///
/// The password is checked before the first network operation.
pub fn establish<C: Connector>(
    connector: &C,
    credentials: &Credentials,
    candidates: &[ServerCandidate],
) -> Result<C::Session> {
    let password = credentials.secret()?;
    let mut failures = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        info!(server = %candidate, user = %credentials.user, "Trying IMAP server");
        match connector.connect(candidate, &credentials.user, password) {
            Ok(session) => {
                info!(server = %candidate, "Connected");
                return Ok(session);
            }
            Err(e) => {
                warn!(server = %candidate, stage = %e.stage, error = %e.reason, "Candidate failed");
                failures.push(CandidateFailure {
                    candidate: candidate.clone(),
                    stage: e.stage,
                    reason: e.reason,
                });
            }
        }
    }

    Err(HarvestError::ConnectionExhausted { failures })
}

/// The probe order used when no servers are configured: `mail.`, `imap.`
/// and the bare domain over implicit TLS, then the same hosts with STARTTLS.
pub fn candidates_for_domain(domain: &str) -> Vec<ServerCandidate> {
    let hosts = [
        format!("mail.{domain}"),
        format!("imap.{domain}"),
        domain.to_string(),
    ];
    let secure = hosts
        .iter()
        .map(|h| ServerCandidate::new(h.clone(), IMAPS_PORT, true));
    let starttls = hosts
        .iter()
        .map(|h| ServerCandidate::new(h.clone(), IMAP_PORT, false));
    secure.chain(starttls).collect()
}
