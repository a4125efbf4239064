//! Harvest pipeline: connect, list folders, fetch every folder, log out.
//!
//! Only a missing password and an exhausted candidate list abort a run.
//! Everything after authentication degrades per folder or per message, and
//! the session is logged out exactly once on every path past `connect`.

use std::ops::{Deref, DerefMut};

use tracing::{info, warn};

use crate::error::Result;
use crate::model::record::FolderName;
use crate::model::snapshot::{MailboxSnapshot, SnapshotBuilder};
use crate::session::connect::{establish, ServerCandidate};
use crate::session::fetch::fetch_folder;
use crate::session::folders::enumerate_folders;
use crate::session::{Connector, Credentials, MailSession};

/// Progress notifications emitted while a harvest runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent<'a> {
    /// Folder `index` (0-based) of `total` is about to be fetched.
    FolderStarted {
        folder: &'a str,
        index: usize,
        total: usize,
    },
    /// `done` of `total` messages in `folder` have been processed.
    Message {
        folder: &'a str,
        done: usize,
        total: usize,
    },
    /// `folder` is complete with `fetched` records.
    FolderDone { folder: &'a str, fetched: usize },
}

/// Logs the session out when dropped.
struct LoggedIn<S: MailSession> {
    session: S,
}

impl<S: MailSession> Deref for LoggedIn<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: MailSession> DerefMut for LoggedIn<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: MailSession> Drop for LoggedIn<S> {
    fn drop(&mut self) {
        match self.session.logout() {
            Ok(()) => info!("Logged out"),
            Err(e) => warn!(error = %e, "Logout failed"),
        }
    }
}

fn open<C: Connector>(
    connector: &C,
    credentials: &Credentials,
    candidates: &[ServerCandidate],
) -> Result<LoggedIn<C::Session>> {
    let session = establish(connector, credentials, candidates)?;
    Ok(LoggedIn { session })
}

/// Run a full harvest and return the snapshot.
///
/// Folders are processed sequentially in sorted order over one session.
pub fn harvest<C: Connector>(
    connector: &C,
    credentials: &Credentials,
    candidates: &[ServerCandidate],
    progress: Option<&dyn Fn(ProgressEvent<'_>)>,
) -> Result<MailboxSnapshot> {
    let mut session = open(connector, credentials, candidates)?;
    let folders = enumerate_folders(&mut *session);

    let total = folders.len();
    let mut builder = SnapshotBuilder::new();
    for (index, folder) in folders.into_iter().enumerate() {
        if let Some(cb) = progress {
            cb(ProgressEvent::FolderStarted {
                folder: &folder,
                index,
                total,
            });
        }

        let on_message = |done: usize, count: usize| {
            if let Some(cb) = progress {
                cb(ProgressEvent::Message {
                    folder: &folder,
                    done,
                    total: count,
                });
            }
        };
        let records = fetch_folder(&mut *session, &folder, Some(&on_message));

        if let Some(cb) = progress {
            cb(ProgressEvent::FolderDone {
                folder: &folder,
                fetched: records.len(),
            });
        }
        builder.push_folder(folder, records);
    }

    let snapshot = builder.finish();
    info!(
        folders = snapshot.folders().len(),
        messages = snapshot.messages().len(),
        "Harvest complete"
    );
    Ok(snapshot)
}

/// Connect and list folders without fetching any message.
pub fn list_remote_folders<C: Connector>(
    connector: &C,
    credentials: &Credentials,
    candidates: &[ServerCandidate],
) -> Result<Vec<FolderName>> {
    let mut session = open(connector, credentials, candidates)?;
    Ok(enumerate_folders(&mut *session))
}
