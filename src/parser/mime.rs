//! MIME normalization: one raw RFC 5322 message in, one [`MessageRecord`] out.
//!
//! Envelope fields are decoded from the raw header block with
//! [`crate::parser::header`]; the body tree is parsed by `mail-parser` and
//! walked depth-first. Nothing in here fails: each field degrades to an empty
//! or raw value on its own.

use encoding_rs::{Encoding, UTF_8};
use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::debug;

use crate::model::address::EmailAddress;
use crate::model::attachment::{AttachmentMeta, UNNAMED_ATTACHMENT};
use crate::model::record::MessageRecord;
use crate::parser::header::{self, decode_charset, decode_encoded_words};

/// Maximum depth for recursive multipart parsing (to prevent stack overflow on adversarial input).
const MAX_DEPTH: usize = 10;

/// Normalize a complete raw message (headers + body) fetched from `folder`.
pub fn normalize_message(raw_message: &[u8], folder: &str) -> MessageRecord {
    let message_bytes = skip_from_line(raw_message);
    let (raw_headers, raw_body) = header::split_message(message_bytes);
    let envelope = header::parse_envelope(raw_headers);

    let (from_name, from_email) = normalize_sender(&envelope.from);

    let mut record = MessageRecord {
        folder: folder.to_string(),
        message_id: envelope.message_id,
        date: header::normalize_date(&envelope.date),
        from_name,
        from_email,
        to: normalize_recipients(&envelope.to),
        cc: normalize_recipients(&envelope.cc),
        subject: decode_encoded_words(&envelope.subject),
        ..Default::default()
    };

    let content = match MessageParser::default().parse(message_bytes) {
        Some(msg) => extract_content(&msg),
        None => {
            debug!(folder = folder, "mail-parser rejected message, using raw body");
            fallback_content(envelope.content_type.as_deref(), raw_body)
        }
    };

    record.set_bodies(&content.text, &content.html);
    record.set_attachments(content.attachments);
    record
}

/// `From` → `(display name, lower-cased address)`.
///
/// An empty display name is replaced by the address as written.
pub fn normalize_sender(raw_from: &str) -> (String, String) {
    let sender = EmailAddress::parse_list(raw_from)
        .into_iter()
        .next()
        .unwrap_or_default()
        .decoded();
    let name = if sender.display_name.is_empty() {
        sender.address.clone()
    } else {
        sender.display_name
    };
    (name, sender.address.to_lowercase())
}

/// `To`/`Cc` → addresses in header order; display names are discarded.
pub fn normalize_recipients(raw: &str) -> Vec<String> {
    EmailAddress::parse_list(raw)
        .into_iter()
        .map(|a| a.address)
        .collect()
}

/// Body and attachment data pulled out of the part tree.
#[derive(Debug, Default)]
struct Content {
    text: String,
    html: String,
    attachments: Vec<AttachmentMeta>,
}

fn extract_content(msg: &Message<'_>) -> Content {
    let mut content = Content::default();
    let Some(root) = msg.parts.first() else {
        return content;
    };

    match &root.body {
        PartType::Multipart(_) | PartType::Message(_) => walk_part(msg, 0, 0, &mut content),
        _ => {
            // Single part: classify by declared type only.
            let text = part_text(root);
            if mime_type(root) == "text/html" {
                content.html = text;
            } else {
                content.text = text;
            }
        }
    }
    content
}

/// Depth-first walk. Attachments are recorded and not descended into; the
/// first non-empty `text/plain` and `text/html` parts win.
fn walk_part(msg: &Message<'_>, part_id: usize, depth: usize, content: &mut Content) {
    if depth > MAX_DEPTH {
        debug!(depth, "MIME tree too deep, ignoring remaining parts");
        return;
    }
    let Some(part) = msg.parts.get(part_id) else {
        return;
    };

    if is_attachment(part) {
        content.attachments.push(attachment_meta(part));
        return;
    }

    match &part.body {
        PartType::Multipart(children) => {
            for &child in children {
                walk_part(msg, child, depth + 1, content);
            }
        }
        PartType::Message(nested) => {
            if !nested.parts.is_empty() {
                walk_part(nested, 0, depth + 1, content);
            }
        }
        _ => match mime_type(part).as_str() {
            "text/plain" if content.text.is_empty() => content.text = part_text(part),
            "text/html" if content.html.is_empty() => content.html = part_text(part),
            _ => {}
        },
    }
}

/// A part is an attachment if its disposition mentions `attachment` or it
/// carries a filename.
fn is_attachment(part: &MessagePart<'_>) -> bool {
    let by_disposition = part
        .content_disposition()
        .map(|d| d.ctype().to_ascii_lowercase().contains("attachment"))
        .unwrap_or(false);
    by_disposition || part.attachment_name().is_some()
}

fn attachment_meta(part: &MessagePart<'_>) -> AttachmentMeta {
    let filename = part
        .attachment_name()
        .map(decode_encoded_words)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNNAMED_ATTACHMENT.to_string());

    AttachmentMeta {
        filename,
        content_type: mime_type(part),
        size_bytes: payload_len(part),
    }
}

/// Transfer-decoded payload length. `mail-parser` hands text parts back as
/// UTF-8, so those are re-encoded in their declared charset first.
fn payload_len(part: &MessagePart<'_>) -> u64 {
    match &part.body {
        PartType::Text(text) | PartType::Html(text) => {
            let encoding = part
                .content_type()
                .and_then(|ct| ct.attribute("charset"))
                .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
                .unwrap_or(UTF_8);
            encoding.encode(text).0.len() as u64
        }
        _ => part.contents().len() as u64,
    }
}

/// Lower-cased `type/subtype`; `text/plain` when the part declares nothing.
fn mime_type(part: &MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct| {
            let main = ct.ctype();
            match ct.subtype() {
                Some(sub) => format!("{main}/{sub}"),
                None => main.to_string(),
            }
        })
        .unwrap_or_else(|| "text/plain".to_string())
        .to_ascii_lowercase()
}

/// Transfer- and charset-decoded text of a leaf part.
fn part_text(part: &MessagePart<'_>) -> String {
    match &part.body {
        PartType::Text(text) | PartType::Html(text) => text.to_string(),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            let charset = part
                .content_type()
                .and_then(|ct| ct.attribute("charset"))
                .unwrap_or("utf-8");
            decode_charset(charset, bytes)
        }
        PartType::Message(_) | PartType::Multipart(_) => String::new(),
    }
}

/// Fallback when `mail-parser` cannot parse the message: the raw body after
/// the header block, classified by the top-level content type.
fn fallback_content(content_type: Option<&str>, raw_body: &[u8]) -> Content {
    let body = String::from_utf8_lossy(raw_body).into_owned();
    if content_type == Some("text/html") {
        Content {
            html: body,
            ..Default::default()
        }
    } else {
        Content {
            text: body,
            ..Default::default()
        }
    }
}

/// Skip an mbox `From ` separator line if the server stored one.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
