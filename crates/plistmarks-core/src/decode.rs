use tracing::debug;

use crate::binary;
use crate::error::DecodeError;
use crate::value::Value;
use crate::xml;

/// Deepest container nesting the decoder accepts. Every later stage relies on
/// this bound. The binary and XML readers recurse once per container, so it
/// must stay safe on a 2 MiB thread stack in an unoptimized build.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Binary,
    Xml,
}

/// Sniffs the document variant from its leading bytes.
pub fn detect(data: &[u8]) -> Option<Format> {
    if data.starts_with(binary::MAGIC) {
        return Some(Format::Binary);
    }
    let text = data.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(data);
    match text.iter().copied().find(|b| !b.is_ascii_whitespace()) {
        Some(b'<') => Some(Format::Xml),
        _ => None,
    }
}

pub fn decode(data: &[u8]) -> Result<Value, DecodeError> {
    decode_with_depth(data, MAX_DEPTH)
}

pub fn decode_with_depth(data: &[u8], max_depth: usize) -> Result<Value, DecodeError> {
    let format = detect(data).ok_or(DecodeError::UnrecognizedFormat)?;
    debug!(?format, len = data.len(), max_depth, "decoding property list");
    let value = match format {
        Format::Binary => {
            let parser = binary::Parser::new(data, max_depth)?;
            debug!(objects = parser.object_count(), "binary plist trailer ok");
            parser.parse()?
        }
        Format::Xml => xml::parse(data, max_depth)?,
    };
    debug!(root = value.kind(), "decoded property list");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_variants() {
        assert_eq!(detect(b"bplist00rest"), Some(Format::Binary));
        assert_eq!(detect(b"\xEF\xBB\xBF  \n<?xml?>"), Some(Format::Xml));
        assert_eq!(detect(b"bplist01"), None);
        assert_eq!(detect(b"{\"Title\":1}"), None);
        assert_eq!(detect(b""), None);
    }

    #[test]
    fn garbage_is_unrecognized() {
        assert!(matches!(
            decode(b"hello world"),
            Err(DecodeError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn magic_only_is_truncated() {
        assert!(matches!(
            decode(b"bplist00"),
            Err(DecodeError::Truncated { .. })
        ));
    }
}
