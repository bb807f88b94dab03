//! XML property-list reader
//!
//! Parses the document with `roxmltree` and walks the `<plist>` element.
//! Apple writes a DOCTYPE declaration, so DTDs are allowed; entity expansion
//! is handled (and bounded) by `roxmltree`.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use roxmltree::{Document as XmlDocument, Node, ParsingOptions};

use crate::error::DecodeError;
use crate::value::{Date, Dictionary, Value};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn parse(data: &[u8], max_depth: usize) -> Result<Value, DecodeError> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    let text = std::str::from_utf8(data)
        .map_err(|e| DecodeError::InvalidString(e.to_string()))?;

    let mut opts = ParsingOptions::default();
    opts.allow_dtd = true;
    let doc = XmlDocument::parse_with_options(text, opts)
        .map_err(|e| DecodeError::Xml(e.to_string()))?;

    let root = doc.root_element();
    if root.tag_name().name() != "plist" {
        return Err(DecodeError::Malformed(format!(
            "root element is <{}>, expected <plist>",
            root.tag_name().name()
        )));
    }
    let mut values = root.children().filter(Node::is_element);
    let top = values
        .next()
        .ok_or_else(|| DecodeError::Malformed("<plist> holds no value".into()))?;
    if values.next().is_some() {
        return Err(DecodeError::Malformed(
            "<plist> holds more than one value".into(),
        ));
    }
    read_value(top, 0, max_depth)
}

fn read_value(node: Node<'_, '_>, depth: usize, max_depth: usize) -> Result<Value, DecodeError> {
    let name = node.tag_name().name();
    let v = match name {
        "dict" => {
            check_depth(depth, max_depth)?;
            let mut dict = Dictionary::new();
            let mut children = node.children().filter(Node::is_element);
            while let Some(key) = children.next() {
                if key.tag_name().name() != "key" {
                    return Err(DecodeError::Malformed(format!(
                        "expected <key> in <dict>, found <{}>",
                        key.tag_name().name()
                    )));
                }
                let k = text_of(key);
                let val = children.next().ok_or_else(|| {
                    DecodeError::Malformed(format!("key '{k}' has no value"))
                })?;
                dict.insert(k, read_value(val, depth + 1, max_depth)?);
            }
            Value::Dictionary(dict)
        }
        "array" => {
            check_depth(depth, max_depth)?;
            let items = node
                .children()
                .filter(Node::is_element)
                .map(|n| read_value(n, depth + 1, max_depth))
                .collect::<Result<Vec<_>, _>>()?;
            Value::Array(items)
        }
        "string" => Value::String(text_of(node)),
        "integer" => Value::Integer(parse_integer(text_of(node).trim())?),
        "real" => {
            let raw = text_of(node);
            let r = raw
                .trim()
                .parse::<f64>()
                .map_err(|_| DecodeError::Malformed(format!("bad <real> '{}'", raw.trim())))?;
            Value::Real(r)
        }
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        "date" => {
            let raw = text_of(node);
            let dt = DateTime::parse_from_rfc3339(raw.trim())
                .map_err(|e| DecodeError::Malformed(format!("bad <date> '{}': {e}", raw.trim())))?;
            Value::Date(Date::from_chrono(dt.with_timezone(&Utc)))
        }
        "data" => {
            let compact: String = text_of(node)
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            let bytes = BASE64
                .decode(compact.as_bytes())
                .map_err(|e| DecodeError::Malformed(format!("bad <data>: {e}")))?;
            Value::Data(bytes)
        }
        other => {
            return Err(DecodeError::Malformed(format!("unknown element <{other}>")));
        }
    };
    Ok(v)
}

fn check_depth(depth: usize, max_depth: usize) -> Result<(), DecodeError> {
    if depth >= max_depth {
        Err(DecodeError::TooDeep { limit: max_depth })
    } else {
        Ok(())
    }
}

// Concatenates text and CDATA children; `Node::text` only returns the first.
fn text_of(node: Node<'_, '_>) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect()
}

fn parse_integer(s: &str) -> Result<i128, DecodeError> {
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let parsed = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i128::from_str_radix(hex, 16),
        None => digits.parse::<i128>(),
    };
    let n = parsed.map_err(|_| DecodeError::Malformed(format!("bad <integer> '{s}'")))?;
    Ok(if neg { -n } else { n })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
"#;

    #[test]
    fn scalars_and_doctype() {
        let doc = format!(
            "{HEADER}<plist version=\"1.0\"><dict>\
             <key>n</key><integer>-42</integer>\
             <key>h</key><integer>0x1F</integer>\
             <key>r</key><real>1.5</real>\
             <key>b</key><true/>\
             <key>d</key><date>2001-01-01T00:01:00Z</date>\
             <key>bytes</key><data>\n  aGVs\n  bG8=\n</data>\
             <key>s</key><string>a &amp; b</string>\
             </dict></plist>"
        );
        let v = parse(doc.as_bytes(), 8).unwrap();
        assert_eq!(v.get("n"), Some(&Value::Integer(-42)));
        assert_eq!(v.get("h"), Some(&Value::Integer(31)));
        assert_eq!(v.get("r"), Some(&Value::Real(1.5)));
        assert_eq!(v.get("b"), Some(&Value::Boolean(true)));
        assert_eq!(v.get("d"), Some(&Value::Date(Date(60.0))));
        assert_eq!(v.get("bytes"), Some(&Value::Data(b"hello".to_vec())));
        assert_eq!(v.get("s").and_then(Value::as_str), Some("a & b"));
    }

    #[test]
    fn key_without_value_is_malformed() {
        let doc = "<plist><dict><key>Title</key></dict></plist>";
        assert!(matches!(
            parse(doc.as_bytes(), 8),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn wrong_root_element() {
        let doc = "<html><body/></html>";
        assert!(matches!(
            parse(doc.as_bytes(), 8),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn unclosed_tag_is_xml_error() {
        let doc = "<plist><dict><key>Title</key><string>x</string>";
        assert!(matches!(parse(doc.as_bytes(), 8), Err(DecodeError::Xml(_))));
    }

    #[test]
    fn nesting_limit() {
        let doc = "<plist><array><array><array/></array></array></plist>";
        assert!(parse(doc.as_bytes(), 3).is_ok());
        assert!(matches!(
            parse(doc.as_bytes(), 2),
            Err(DecodeError::TooDeep { limit: 2 })
        ));
    }
}
