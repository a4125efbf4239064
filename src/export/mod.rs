//! Export functionality: JSON documents for a finished harvest.

pub mod json;
