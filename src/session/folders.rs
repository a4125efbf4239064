//! Folder enumerator.

use tracing::{info, warn};

use super::MailSession;
use crate::model::record::FolderName;
use crate::parser::listing::parse_list_reply;

/// List every folder on the server, deduplicated and sorted.
///
/// A failed `LIST` is logged and yields no folders; the run then completes
/// with an empty snapshot instead of aborting.
pub fn enumerate_folders<S: MailSession>(session: &mut S) -> Vec<FolderName> {
    match session.list_folders() {
        Ok(reply) => {
            let folders = parse_list_reply(&reply);
            info!(count = folders.len(), "Listed folders");
            folders
        }
        Err(e) => {
            warn!(error = %e, "LIST failed, no folders to fetch");
            Vec::new()
        }
    }
}
