//! Error types for decoding, normalizing, and translating bookmark documents
//!
//! Each stage has its own error; `TranslateError` wraps them with the stage
//! that failed so callers can tell a bad input from an unrepresentable tree.

use std::path::PathBuf;

use thiserror::Error;

/// The input is not a usable property-list document.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a property-list document (expected `bplist00` magic or XML)")]
    UnrecognizedFormat,

    #[error("truncated input: needed {needed} bytes at offset {at:#x}")]
    Truncated { needed: usize, at: usize },

    #[error("invalid binary plist trailer: {0}")]
    InvalidTrailer(String),

    #[error("object {object} has out-of-range offset {offset:#x}")]
    InvalidOffset { object: usize, offset: usize },

    #[error("object reference {reference} out of range ({count} objects)")]
    InvalidReference { reference: usize, count: usize },

    #[error("unknown object marker {marker:#04x} at offset {at:#x}")]
    UnknownMarker { marker: u8, at: usize },

    #[error("invalid string data: {0}")]
    InvalidString(String),

    #[error("dictionary key is not a string")]
    NonStringKey,

    #[error("object {object} references itself through its children")]
    Cycle { object: usize },

    #[error("nesting exceeds {limit} levels")]
    TooDeep { limit: usize },

    #[error("shared objects expand past {limit} values")]
    Expansion { limit: usize },

    #[error("invalid XML: {0}")]
    Xml(String),

    #[error("malformed plist: {0}")]
    Malformed(String),
}

/// A tree cannot be represented in the requested output.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{field} at '{path}': expected {expected}, found {found}")]
    UnexpectedKind {
        path: String,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// XML 1.0 has no spelling for the value (control characters, dates
    /// outside the calendar).
    #[error("not representable in XML: {0}")]
    Unrepresentable(String),
}

impl EncodeError {
    pub(crate) fn unexpected(
        path: &str,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        let path = if path.is_empty() { "/" } else { path };
        EncodeError::UnexpectedKind {
            path: path.to_string(),
            field,
            expected,
            found,
        }
    }
}

/// Failure of a whole translation, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
