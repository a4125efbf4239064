//! Email address parsing (RFC 5322 §3.4).

use crate::parser::header::decode_encoded_words;

/// A parsed email address.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com (User)"` → `display_name = "User"`, `address = "user@example.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty). Still RFC 2047 encoded
    /// until [`EmailAddress::decoded`] is called.
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Parse a single email address from a raw header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    /// - `"user@domain.com (Display Name)"`
    ///
    /// Anything without an `@` and without angle brackets yields an empty
    /// address.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start {
                    let addr = trimmed[angle_start + 1..angle_end].trim().to_string();
                    let name_part = trimmed[..angle_start].trim();
                    return Self {
                        display_name: strip_quotes(name_part),
                        address: addr,
                    };
                }
            }
        }

        // Old-style trailing comment: "user@domain.com (Display Name)"
        if let (Some(open), true) = (trimmed.find('('), trimmed.ends_with(')')) {
            let addr = trimmed[..open].trim();
            if addr.contains('@') {
                return Self {
                    display_name: trimmed[open + 1..trimmed.len() - 1].trim().to_string(),
                    address: addr.to_string(),
                };
            }
        }

        if trimmed.contains('@') && !trimmed.contains(char::is_whitespace) {
            return Self {
                display_name: String::new(),
                address: trimmed.to_string(),
            };
        }

        Self::default()
    }

    /// Parse a comma-separated list of addresses.
    ///
    /// Handles quoted commas (`"Last, First" <a@b.com>, other@c.com`) and
    /// RFC 5322 groups (`Team: a@b.com, c@d.com;`). Entries without an
    /// address are dropped.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        let mut flush = |current: &mut String| {
            let addr = Self::parse(current);
            if !addr.address.is_empty() {
                results.push(addr);
            }
            current.clear();
        };

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                // Group name: everything before it is a label, not an address.
                ':' if !in_quotes && !in_angle => current.clear(),
                ',' | ';' if !in_quotes && !in_angle => flush(&mut current),
                _ => current.push(ch),
            }
        }
        flush(&mut current);

        results
    }

    /// Return a copy with the display name run through RFC 2047 decoding.
    pub fn decoded(&self) -> Self {
        Self {
            display_name: decode_encoded_words(&self.display_name),
            address: self.address.clone(),
        }
    }
}

/// The substring between the first `@` and the next one (or the end).
pub fn domain_of(address: &str) -> Option<&str> {
    address.split('@').nth(1)
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}
