//! The normalized per-message record.

use super::attachment::AttachmentMeta;

/// Protocol-supplied folder name. Opaque: may contain hierarchy delimiters,
/// spaces or non-ASCII text.
pub type FolderName = String;

/// Maximum number of characters kept in [`MessageRecord::body_text`].
pub const BODY_TEXT_LIMIT: usize = 3000;

/// Maximum number of characters kept in [`MessageRecord::body_html_preview`].
pub const BODY_HTML_LIMIT: usize = 500;

/// Canonical normalized form of one mail message.
///
/// Every field is always present; anything missing or undecodable in the
/// source message is represented by an empty value.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MessageRecord {
    /// Folder the message was retrieved from.
    pub folder: FolderName,

    /// `Message-ID` header value, verbatim. Not unique, not a dedup key.
    pub message_id: String,

    /// RFC 3339 timestamp when the `Date` header parsed, otherwise the raw
    /// header text. Consumers must parse defensively.
    pub date: String,

    /// Decoded sender display name; the address itself when the name is empty.
    pub from_name: String,

    /// Lower-cased sender address; empty when the header is malformed.
    pub from_email: String,

    /// `To` addresses, in header order.
    pub to: Vec<String>,

    /// `Cc` addresses, in header order.
    pub cc: Vec<String>,

    /// Decoded subject.
    pub subject: String,

    /// First plain-text body part, at most [`BODY_TEXT_LIMIT`] characters.
    pub body_text: String,

    /// First HTML body part, at most [`BODY_HTML_LIMIT`] characters.
    pub body_html_preview: String,

    pub attachments: Vec<AttachmentMeta>,

    /// `true` iff `attachments` is non-empty.
    pub has_attachments: bool,
}

impl MessageRecord {
    /// Replace the attachment list, keeping `has_attachments` in sync.
    pub fn set_attachments(&mut self, attachments: Vec<AttachmentMeta>) {
        self.has_attachments = !attachments.is_empty();
        self.attachments = attachments;
    }

    /// Set both bodies, truncated to their character limits.
    pub fn set_bodies(&mut self, text: &str, html: &str) {
        self.body_text = truncate_chars(text, BODY_TEXT_LIMIT);
        self.body_html_preview = truncate_chars(html, BODY_HTML_LIMIT);
    }
}

/// Keep at most `limit` characters (not bytes) of `s`.
pub fn truncate_chars(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((byte_pos, _)) => s[..byte_pos].to_string(),
        None => s.to_string(),
    }
}
