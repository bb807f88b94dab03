//! plistmarks-core: property-list bookmark decoding and JSON normalization
//!
//! The crate keeps a small surface:
//! - Decoder for binary (`bplist00`) and XML property lists into a tagged `Value` tree
//! - Normalizer that maps the generic tree onto typed `BookmarkNode`s
//! - JSON re-encoder with fixed field order and two-space indentation
//! - `translate`: the one-shot bytes-in, bytes-out driver used by the CLI
//! - Raw dump and batch directory helpers for inspecting bookmark files
//!
pub mod batch;
pub mod binary;
pub mod decode;
pub mod error;
pub mod json;
pub mod normalize;
pub mod translate;
pub mod value;
pub mod write;
pub mod xml;

pub use batch::{BatchEntry, batch_to_json, find_plist_files, translate_dir};
pub use decode::{Format, MAX_DEPTH, decode, decode_with_depth, detect};
pub use error::{DecodeError, EncodeError, TranslateError};
pub use json::{DumpOpts, to_json, value_to_json};
pub use normalize::{BookmarkNode, TreeStats, UriDictionary, normalize, summarize};
pub use translate::{TranslateOpts, dump_raw, translate, translate_to_node, translate_with};
pub use value::{Date, Dictionary, Value};
