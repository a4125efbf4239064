//! Parsing of untrusted mail data: header decoding, LIST replies and MIME normalization.

pub mod header;
pub mod listing;
pub mod mime;
