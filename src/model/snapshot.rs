//! The complete output of one harvest run.

use std::collections::BTreeMap;

use super::record::{FolderName, MessageRecord};

/// Everything fetched in one pass over the mailbox.
///
/// Built incrementally by the harvest pipeline through [`SnapshotBuilder`]
/// and immutable once [`SnapshotBuilder::finish`] has run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MailboxSnapshot {
    folders: Vec<FolderName>,
    by_folder: BTreeMap<FolderName, Vec<MessageRecord>>,
    messages: Vec<MessageRecord>,
}

impl MailboxSnapshot {
    /// Folder names in processing order (sorted, deduplicated).
    pub fn folders(&self) -> &[FolderName] {
        &self.folders
    }

    /// Records of one folder, in server order. Empty for unknown folders.
    pub fn folder_messages(&self, folder: &str) -> &[MessageRecord] {
        self.by_folder.get(folder).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All records, folder after folder.
    pub fn messages(&self) -> &[MessageRecord] {
        &self.messages
    }

    /// `(folder, records)` pairs in folder order, including empty folders.
    pub fn iter_folders(&self) -> impl Iterator<Item = (&FolderName, &[MessageRecord])> {
        self.folders
            .iter()
            .map(|f| (f, self.folder_messages(f)))
    }
}

/// Single-writer accumulator for a [`MailboxSnapshot`].
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: MailboxSnapshot,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the complete result for one folder. Called once per folder,
    /// after that folder's fetch loop has finished.
    pub fn push_folder(&mut self, folder: FolderName, records: Vec<MessageRecord>) {
        self.snapshot.messages.extend(records.iter().cloned());
        if !self.snapshot.by_folder.contains_key(&folder) {
            self.snapshot.folders.push(folder.clone());
        }
        self.snapshot
            .by_folder
            .entry(folder)
            .or_default()
            .extend(records);
    }

    pub fn finish(self) -> MailboxSnapshot {
        self.snapshot
    }
}
