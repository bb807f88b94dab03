//! One-shot translation driver: bytes in, JSON bytes out.
//!
//! Every function here is a pure function of its input. Either a complete
//! document comes back or an error tagged with the failing stage; nothing is
//! written on failure.

use tracing::debug;

use crate::decode::{MAX_DEPTH, decode_with_depth};
use crate::error::{EncodeError, TranslateError};
use crate::json::{DumpOpts, to_json, value_to_json};
use crate::normalize::{BookmarkNode, normalize};

#[derive(Clone, Copy, Debug)]
pub struct TranslateOpts {
    /// Container nesting limit; values above `MAX_DEPTH` are clamped.
    pub max_depth: usize,
}

impl Default for TranslateOpts {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
        }
    }
}

impl TranslateOpts {
    fn depth(&self) -> usize {
        self.max_depth.min(MAX_DEPTH)
    }
}

pub fn translate(bytes: &[u8]) -> Result<Vec<u8>, TranslateError> {
    translate_with(bytes, &TranslateOpts::default())
}

pub fn translate_with(bytes: &[u8], opts: &TranslateOpts) -> Result<Vec<u8>, TranslateError> {
    let node = translate_to_node(bytes, opts)?;
    let out = to_json(&node)?;
    debug!(bytes_in = bytes.len(), bytes_out = out.len(), "translated");
    Ok(out)
}

/// Decode and normalize without serializing.
pub fn translate_to_node(
    bytes: &[u8],
    opts: &TranslateOpts,
) -> Result<BookmarkNode, TranslateError> {
    let value = decode_with_depth(bytes, opts.depth())?;
    Ok(normalize(&value)?)
}

/// Pretty JSON of the whole decoded tree, recognized fields or not.
pub fn dump_raw(bytes: &[u8], opts: &DumpOpts) -> Result<Vec<u8>, TranslateError> {
    let value = decode_with_depth(bytes, MAX_DEPTH)?;
    let mut out = serde_json::to_vec_pretty(&value_to_json(&value, opts)).map_err(EncodeError::from)?;
    out.push(b'\n');
    Ok(out)
}
