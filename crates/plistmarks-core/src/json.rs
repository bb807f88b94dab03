use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::SecondsFormat;
use serde_json::json;

use crate::error::EncodeError;
use crate::normalize::BookmarkNode;
use crate::value::Value;

/// Options for the raw (un-normalized) dump.
#[derive(Clone, Copy, Debug, Default)]
pub struct DumpOpts {
    /// Emit `<data>` payloads as base64 instead of a length summary.
    pub bytes_full: bool,
}

/// Pretty JSON (two-space indent, trailing newline) for a normalized tree.
pub fn to_json(node: &BookmarkNode) -> Result<Vec<u8>, EncodeError> {
    let mut out = serde_json::to_vec_pretty(node)?;
    out.push(b'\n');
    Ok(out)
}

/// Mirrors every key and value of the decoded tree. Depth is bounded by the
/// decoder's nesting limit.
pub fn value_to_json(v: &Value, opts: &DumpOpts) -> serde_json::Value {
    match v {
        Value::String(s) => json!(s),
        Value::Integer(n) => match i64::try_from(*n) {
            Ok(x) => json!(x),
            Err(_) => match u64::try_from(*n) {
                Ok(x) => json!(x),
                Err(_) => json!(n.to_string()),
            },
        },
        Value::Real(r) => serde_json::Number::from_f64(*r)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Boolean(b) => json!(b),
        Value::Date(d) => match d.to_chrono() {
            Some(dt) => json!(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serde_json::Value::Null,
        },
        Value::Data(bytes) => {
            if opts.bytes_full {
                json!(BASE64.encode(bytes))
            } else {
                json!({"$type": "bytes", "len": bytes.len()})
            }
        }
        Value::Uid(id) => json!({"$uid": id}),
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|it| value_to_json(it, opts)).collect())
        }
        Value::Dictionary(d) => {
            let mut map = serde_json::Map::with_capacity(d.len());
            for (k, val) in d.iter() {
                map.insert(k.to_string(), value_to_json(val, opts));
            }
            serde_json::Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Date, Dictionary};

    #[test]
    fn two_space_indent_and_fixed_order() {
        let node = BookmarkNode {
            children: Some(vec![]),
            title: Some("Root".into()),
            ..Default::default()
        };
        let text = String::from_utf8(to_json(&node).unwrap()).unwrap();
        assert_eq!(text, "{\n  \"Title\": \"Root\",\n  \"Children\": []\n}\n");
    }

    #[test]
    fn raw_dump_scalars() {
        let d: Dictionary = vec![
            ("when", Value::Date(Date(0.0))),
            ("blob", Value::Data(vec![1, 2, 3])),
            ("big", Value::Integer(i128::from(u64::MAX))),
            ("nan", Value::Real(f64::NAN)),
            ("uid", Value::Uid(4)),
        ]
        .into_iter()
        .collect();
        let v = value_to_json(&Value::Dictionary(d.clone()), &DumpOpts::default());
        assert_eq!(v["when"], json!("2001-01-01T00:00:00Z"));
        assert_eq!(v["blob"], json!({"$type": "bytes", "len": 3}));
        assert_eq!(v["big"], json!(u64::MAX));
        assert_eq!(v["nan"], serde_json::Value::Null);
        assert_eq!(v["uid"], json!({"$uid": 4}));

        let full = value_to_json(&Value::Dictionary(d), &DumpOpts { bytes_full: true });
        assert_eq!(full["blob"], json!("AQID"));
    }
}
