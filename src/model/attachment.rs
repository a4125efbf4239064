//! Attachment metadata.
//!
//! Only metadata is kept; the payload itself is never stored.

/// Filename recorded when a part carries none.
pub const UNNAMED_ATTACHMENT: &str = "unnamed";

/// Metadata about one attachment part of a message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AttachmentMeta {
    /// Decoded filename, or [`UNNAMED_ATTACHMENT`].
    pub filename: String,

    /// Declared MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Length in bytes of the transfer-decoded payload (0 if absent).
    pub size_bytes: u64,
}
