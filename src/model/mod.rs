//! Core data model types: normalized message records, addresses, attachments
//! and the mailbox snapshot.

pub mod address;
pub mod attachment;
pub mod record;
pub mod snapshot;
