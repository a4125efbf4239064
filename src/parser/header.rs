//! RFC 5322 header parsing: folding, encoded-words (RFC 2047), and date parsing.
//!
//! Every function here is total: malformed input degrades to an empty or raw
//! value instead of an error, except for the `try_` variants which report
//! what went wrong so callers can log it.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, warn};

use crate::error::{HarvestError, Result};

/// Base64 engine for encoded words: senders routinely drop the padding.
const LENIENT_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The envelope headers of one message, unfolded but still undecoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEnvelope {
    pub from: String,
    pub to: String,
    pub cc: String,
    pub subject: String,
    pub date: String,
    pub message_id: String,
    /// Lower-cased `type/subtype` of the top-level `Content-Type`, if any.
    pub content_type: Option<String>,
}

/// Extract the envelope headers from the header block of a raw message.
///
/// Missing headers are empty strings; the first occurrence of a repeated
/// header wins.
pub fn parse_envelope(raw_headers: &[u8]) -> RawEnvelope {
    let text = decode_header_bytes(raw_headers);
    let headers = unfold_headers(&text);

    RawEnvelope {
        from: get_header(&headers, "from").unwrap_or_default(),
        to: get_header(&headers, "to").unwrap_or_default(),
        cc: get_header(&headers, "cc").unwrap_or_default(),
        subject: get_header(&headers, "subject").unwrap_or_default(),
        date: get_header(&headers, "date").unwrap_or_default(),
        message_id: get_header(&headers, "message-id")
            .map(|s| extract_angle_bracket(&s))
            .unwrap_or_default(),
        content_type: get_header(&headers, "content-type")
            .map(|ct| ct.split(';').next().unwrap_or("").trim().to_lowercase())
            .filter(|ct| !ct.is_empty()),
    }
}

/// Split a raw message into `(headers, body)` at the first blank line.
///
/// A message without a blank line is all headers.
pub fn split_message(data: &[u8]) -> (&[u8], &[u8]) {
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return (&data[..i], &data[i + 2..]);
        }
        if i + 3 < data.len()
            && data[i] == b'\r'
            && data[i + 1] == b'\n'
            && data[i + 2] == b'\r'
            && data[i + 3] == b'\n'
        {
            return (&data[..i], &data[i + 4..]);
        }
    }
    (data, &[])
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
        // Lines without a colon and not a continuation are silently skipped
    }

    result
}

/// Get the first value for a header name (case-insensitive).
fn get_header(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
}

/// Extract content between `<` and `>`, brackets included.
fn extract_angle_bracket(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(start) = trimmed.find('<') {
        if let Some(end) = trimmed[start..].find('>') {
            return trimmed[start..start + end + 1].to_string();
        }
    }
    trimmed.to_string()
}

// ── Encoded words ───────────────────────────────────────────────

enum Segment {
    Literal(String),
    Encoded { charset: String, bytes: Vec<u8> },
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// On any decoding failure the raw input is returned unchanged.
pub fn decode_encoded_words(input: &str) -> String {
    match try_decode_encoded_words(input) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!(value = input, error = %e, "Keeping raw header value");
            input.to_string()
        }
    }
}

/// Decode RFC 2047 encoded-words, reporting malformed payloads.
///
/// Adjacent encoded words in the same charset are concatenated before
/// charset decoding (so multi-byte sequences split across words survive);
/// the remaining decoded segments are joined with single spaces. Input
/// without any encoded word is returned as-is.
pub fn try_decode_encoded_words(input: &str) -> Result<String> {
    let segments = split_encoded_words(input)?;
    if !segments
        .iter()
        .any(|s| matches!(s, Segment::Encoded { .. }))
    {
        return Ok(input.to_string());
    }

    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Literal(text) if text.trim().is_empty() => {}
            Segment::Encoded { charset, bytes } => match merged.last_mut() {
                Some(Segment::Encoded {
                    charset: prev,
                    bytes: prev_bytes,
                }) if prev.eq_ignore_ascii_case(&charset) => prev_bytes.extend(bytes),
                _ => merged.push(Segment::Encoded { charset, bytes }),
            },
            literal => merged.push(literal),
        }
    }

    let parts: Vec<String> = merged
        .into_iter()
        .map(|segment| match segment {
            Segment::Literal(text) => text.trim().to_string(),
            Segment::Encoded { charset, bytes } => decode_charset(&charset, &bytes),
        })
        .collect();
    Ok(parts.join(" "))
}

fn split_encoded_words(input: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut remaining = input;

    while let Some(start) = remaining.find("=?") {
        literal.push_str(&remaining[..start]);
        let after_start = &remaining[start + 2..];

        match parse_one_word(after_start)? {
            Some((charset, bytes, consumed)) => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Encoded { charset, bytes });
                remaining = &after_start[consumed..];
            }
            None => {
                literal.push_str("=?");
                remaining = after_start;
            }
        }
    }

    literal.push_str(remaining);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Parse `charset?encoding?text?=` (the part after the leading `=?`).
///
/// `Ok(None)` means "not an encoded word", `Err` means an encoded word whose
/// payload is corrupt.
fn parse_one_word(s: &str) -> Result<Option<(String, Vec<u8>, usize)>> {
    let Some(first_q) = s.find('?') else {
        return Ok(None);
    };
    let charset = &s[..first_q];
    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return Ok(None);
    }

    let rest = &s[first_q + 1..];
    let Some(second_q) = rest.find('?') else {
        return Ok(None);
    };
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let Some(end) = rest2.find("?=") else {
        return Ok(None);
    };
    let encoded_text = &rest2[..end];
    if encoded_text.contains(char::is_whitespace) {
        return Ok(None);
    }

    let consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => LENIENT_B64
            .decode(encoded_text)
            .map_err(|e| HarvestError::HeaderDecode(format!("base64 in '=?{charset}?B?': {e}")))?,
        "Q" => decode_q_encoding(encoded_text),
        _ => return Ok(None),
    };

    // RFC 2231 language suffix: "UTF-8*en"
    let charset = charset.split('*').next().unwrap_or(charset).to_string();
    Ok(Some((charset, bytes, consumed)))
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                match u8::from_str_radix(hex, 16) {
                    Ok(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    Err(_) => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset.
///
/// Unknown charsets fall back to lossy UTF-8.
pub fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    let charset_lower = charset.to_lowercase();
    match charset_lower.as_str() {
        "utf-8" | "utf8" | "us-ascii" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            } else {
                warn!(
                    charset = charset,
                    "Unknown charset, falling back to UTF-8 lossy"
                );
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}

// ── Dates ───────────────────────────────────────────────────────

/// Normalize a `Date` header: RFC 3339 with the sender's offset when it
/// parses, otherwise the raw value unchanged.
pub fn normalize_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(dt) => dt.to_rfc3339(),
        None => raw.to_string(),
    }
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, and many broken real-world variants. The
/// original UTC offset is preserved; dates without one are taken as UTC.
pub fn parse_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = strip_trailing_comment(date_str.trim());
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt);
    }

    let no_dow = strip_day_of_week(trimmed);

    // IMAP-style: "16-JUL-2025 03:01:03" → normalize to "16 Jul 2025 03:01:03"
    let no_dow_normalized = normalize_imap_date(&no_dow);

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];

    for candidate in [&no_dow, &no_dow_normalized] {
        for fmt in &formats {
            if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
                return Some(dt);
            }
            if let Ok(ndt) = NaiveDateTime::parse_from_str(candidate, fmt) {
                return Some(Utc.from_utc_datetime(&ndt).fixed_offset());
            }
        }
    }

    // Replace named timezones with offsets and try again
    for candidate in [&no_dow, &no_dow_normalized] {
        let replaced = replace_named_tz(candidate);
        for fmt in &formats {
            if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
                return Some(dt);
            }
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    debug!(date = trimmed, "Could not parse date");
    None
}

/// Attempt to parse a date using `mail-parser`'s built-in parser.
fn mail_parser_date(input: &str) -> Option<DateTime<FixedOffset>> {
    use mail_parser::MessageParser;

    // Wrap input in a minimal RFC 5322 message so mail-parser can parse it
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt).ok()
}

/// Drop a trailing `(comment)` such as `"+0100 (CET)"`.
fn strip_trailing_comment(s: &str) -> &str {
    match (s.rfind('('), s.ends_with(')')) {
        (Some(open), true) => s[..open].trim_end(),
        _ => s,
    }
}

/// Normalize IMAP-style dates: `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_imap_date(s: &str) -> String {
    if !s.contains('-') {
        return s.to_string();
    }

    let title_months = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    for month in &title_months {
        for variant in [month.to_uppercase(), month.to_lowercase(), month.to_string()] {
            let pattern = format!("-{variant}-");
            if s.contains(&pattern) {
                return s.replacen(&pattern, &format!(" {month} "), 1);
            }
        }
    }

    s.to_string()
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            if rest.starts_with(',') || rest.starts_with(' ') {
                return rest.trim_start_matches(',').trim().to_string();
            }
        }
    }
    s.to_string()
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("CEST", "+0200"),
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("UT", "+0000"),
        ("CET", "+0100"),
        ("JST", "+0900"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(name) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}
