//! Message fetcher: one folder, read-only, message by message.

use tracing::{debug, info, warn};

use super::MailSession;
use crate::error::HarvestError;
use crate::model::record::MessageRecord;
use crate::parser::mime::normalize_message;

/// Fetch and normalize every message of `folder`, in server order.
///
/// Never fails: an unselectable folder or a failed search yields no records,
/// and a message that cannot be retrieved is skipped. `progress` receives
/// `(processed, total)` after each message.
pub fn fetch_folder<S: MailSession>(
    session: &mut S,
    folder: &str,
    progress: Option<&dyn Fn(usize, usize)>,
) -> Vec<MessageRecord> {
    let exists = match session.examine(folder) {
        Ok(n) => n,
        Err(e) => {
            let err = HarvestError::FolderSelect {
                folder: folder.to_string(),
                reason: e.to_string(),
            };
            warn!(error = %err, "Skipping folder");
            return Vec::new();
        }
    };

    if exists == 0 {
        debug!(folder = folder, "Folder is empty");
        return Vec::new();
    }

    let ids = match session.search_all() {
        Ok(ids) => ids,
        Err(e) => {
            let err = HarvestError::Search {
                folder: folder.to_string(),
                reason: e.to_string(),
            };
            warn!(error = %err, "Skipping folder");
            return Vec::new();
        }
    };

    info!(folder = folder, count = ids.len(), "Fetching messages");

    let total = ids.len();
    let mut records = Vec::with_capacity(total);
    for (i, id) in ids.into_iter().enumerate() {
        match session.fetch_raw(id) {
            Ok(raw) if !raw.is_empty() => records.push(normalize_message(&raw, folder)),
            Ok(_) => {
                let err = HarvestError::MessageRetrieval {
                    folder: folder.to_string(),
                    id,
                    reason: "empty message body".to_string(),
                };
                warn!(error = %err, "Skipping message");
            }
            Err(e) => {
                let err = HarvestError::MessageRetrieval {
                    folder: folder.to_string(),
                    id,
                    reason: e.to_string(),
                };
                warn!(error = %err, "Skipping message");
            }
        }
        if let Some(cb) = progress {
            cb(i + 1, total);
        }
    }

    info!(folder = folder, fetched = records.len(), "Folder done");
    records
}
