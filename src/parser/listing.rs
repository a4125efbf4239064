//! Tolerant parser for IMAP `LIST` replies.
//!
//! Real servers disagree on quoting, send literals for names with special
//! characters, and occasionally emit lines that are not LIST data at all.
//! Each line either yields one confident folder name or nothing.

use std::collections::BTreeSet;

use tracing::debug;

use crate::model::record::FolderName;

/// Untagged response prefixes that carry folder data.
const LIST_PREFIXES: [&str; 3] = ["* LIST ", "* XLIST ", "* LSUB "];

/// Parse a complete `LIST` reply into a sorted, deduplicated folder list.
///
/// Lines that cannot be parsed confidently are skipped. Running this twice on
/// the same reply yields the same result.
pub fn parse_list_reply<S: AsRef<str>>(lines: &[S]) -> Vec<FolderName> {
    let mut folders = BTreeSet::new();
    let mut iter = lines.iter().map(AsRef::as_ref);

    while let Some(line) = iter.next() {
        match parse_list_line(line) {
            Some(ListName::Name(name)) => {
                folders.insert(name);
            }
            Some(ListName::Literal(len)) => {
                // The name follows on the next line as `len` raw bytes.
                let Some(next) = iter.next() else { break };
                if let Some(name) = take_literal(next, len) {
                    folders.insert(name);
                }
            }
            None => debug!(line = line, "Skipping unparseable LIST line"),
        }
    }

    folders.into_iter().collect()
}

#[derive(Debug, PartialEq, Eq)]
enum ListName {
    Name(FolderName),
    /// `{n}`: the name is sent as a literal on the following line.
    Literal(usize),
}

/// Parse one `LIST` line: `(flags) delimiter name`.
fn parse_list_line(line: &str) -> Option<ListName> {
    let line = line.trim_end_matches(['\r', '\n']);
    let body = LIST_PREFIXES
        .iter()
        .find_map(|p| line.strip_prefix(p))
        .unwrap_or(line)
        .trim_start();

    // Flag group
    let rest = body.strip_prefix('(')?;
    let close = rest.find(')')?;
    let rest = rest[close + 1..].trim_start();

    // Hierarchy delimiter: quoted string or NIL
    let rest = if let Some(after) = rest.strip_prefix("NIL") {
        after
    } else {
        let (_, after) = take_quoted(rest)?;
        after
    };
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }

    if rest.starts_with('"') {
        let (name, after) = take_quoted(rest)?;
        if !after.trim().is_empty() || name.is_empty() {
            return None;
        }
        return Some(ListName::Name(name));
    }

    if let Some(len) = rest
        .strip_prefix('{')
        .and_then(|r| r.strip_suffix('}'))
        .and_then(|n| n.trim_end_matches('+').parse::<usize>().ok())
    {
        return Some(ListName::Literal(len));
    }

    // Unquoted atom; tolerate embedded spaces and a stray trailing quote.
    let name = rest.trim_matches('"').trim();
    if name.is_empty() {
        None
    } else {
        Some(ListName::Name(name.to_string()))
    }
}

/// Read a quoted string at the start of `s`, honoring `\"` and `\\`.
///
/// Returns the unescaped content and the remainder after the closing quote.
fn take_quoted(s: &str) -> Option<(String, &str)> {
    let inner = s.strip_prefix('"')?;
    let mut out = String::new();
    let mut chars = inner.char_indices();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '\\' => {
                let (_, escaped) = chars.next()?;
                out.push(escaped);
            }
            '"' => return Some((out, &inner[i + 1..])),
            _ => out.push(ch),
        }
    }
    None
}

/// Take the first `len` bytes of a literal line as a folder name.
fn take_literal(line: &str, len: usize) -> Option<FolderName> {
    let bytes = line.as_bytes();
    let end = len.min(bytes.len());
    let name = String::from_utf8_lossy(&bytes[..end]).trim().to_string();
    (!name.is_empty()).then_some(name)
}
