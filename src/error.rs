//! Centralized error types for mailharvest.

use std::path::PathBuf;
use thiserror::Error;

use crate::session::connect::CandidateFailure;

/// All errors produced by the mailharvest library.
///
/// Only [`HarvestError::CredentialMissing`] and
/// [`HarvestError::ConnectionExhausted`] abort a run. The per-folder and
/// per-message kinds are logged where they occur and turned into omissions.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// No password was supplied. Raised before any network activity.
    #[error("No password configured for account '{user}'")]
    CredentialMissing { user: String },

    /// Every server candidate failed to connect or authenticate.
    #[error("Could not connect to any IMAP server ({} candidate(s) tried){}", .failures.len(), format_failures(.failures))]
    ConnectionExhausted { failures: Vec<CandidateFailure> },

    /// The folder could not be opened read-only.
    #[error("Cannot select folder '{folder}': {reason}")]
    FolderSelect { folder: String, reason: String },

    /// `SEARCH ALL` failed inside a selected folder.
    #[error("Search failed in folder '{folder}': {reason}")]
    Search { folder: String, reason: String },

    /// A single message could not be retrieved.
    #[error("Cannot retrieve message {id} in '{folder}': {reason}")]
    MessageRetrieval {
        folder: String,
        id: u32,
        reason: String,
    },

    /// A header field could not be decoded; the field keeps its raw value.
    #[error("Cannot decode header value: {0}")]
    HeaderDecode(String),

    /// A protocol-level error reported by the session backend.
    #[error("IMAP error: {0}")]
    Session(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, HarvestError>`.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for the kinds that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CredentialMissing { .. } | Self::ConnectionExhausted { .. }
        )
    }
}

impl From<imap::Error> for HarvestError {
    fn from(e: imap::Error) -> Self {
        Self::Session(e.to_string())
    }
}

fn format_failures(failures: &[CandidateFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("\n  {f}"))
        .collect::<String>()
}
