//! `mailharvest` — download an entire IMAP mailbox into normalized records.
//!
//! The library connects to the first server candidate that authenticates,
//! enumerates every folder, fetches and normalizes each message read-only,
//! and computes sender and domain statistics over the resulting
//! [`MailboxSnapshot`](model::snapshot::MailboxSnapshot). Everything network
//! facing sits behind the [`session::Connector`] and [`session::MailSession`]
//! traits.

pub mod config;
pub mod error;
pub mod export;
pub mod harvest;
pub mod model;
pub mod parser;
pub mod session;
pub mod stats;
