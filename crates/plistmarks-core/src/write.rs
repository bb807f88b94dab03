// Property-list writers used to build fixtures and sample files.
// Objects are not de-duplicated; output is valid but not byte-minimal.
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::SecondsFormat;
use std::fmt::Write as _;

use crate::binary::MAGIC;
use crate::error::EncodeError;
use crate::value::{Dictionary, Value};

enum Flat<'v> {
    Key(&'v str),
    Scalar(&'v Value),
    Array(Vec<usize>),
    Dict(Vec<usize>, Vec<usize>),
}

pub fn encode_binary(root: &Value) -> Vec<u8> {
    let mut objects = Vec::new();
    flatten(root, &mut objects);
    let ref_size = min_bytes(objects.len() as u64);

    let mut w = Writer {
        out: MAGIC.to_vec(),
        ref_size,
    };
    let mut offsets = Vec::with_capacity(objects.len());
    for obj in &objects {
        offsets.push(w.out.len() as u64);
        w.object(obj);
    }

    let table = w.out.len() as u64;
    let offset_size = min_bytes(table);
    for off in offsets {
        w.sized(off, offset_size);
    }
    w.out.extend_from_slice(&[0u8; 6]);
    w.push(offset_size as u8);
    w.push(ref_size as u8);
    w.out.extend_from_slice(&(objects.len() as u64).to_be_bytes());
    w.out.extend_from_slice(&0u64.to_be_bytes());
    w.out.extend_from_slice(&table.to_be_bytes());
    w.out
}

fn flatten<'v>(v: &'v Value, out: &mut Vec<Flat<'v>>) -> usize {
    let idx = out.len();
    out.push(Flat::Scalar(v));
    match v {
        Value::Array(items) => {
            let refs = items.iter().map(|it| flatten(it, out)).collect();
            out[idx] = Flat::Array(refs);
        }
        Value::Dictionary(d) => {
            let mut keys = Vec::with_capacity(d.len());
            let mut vals = Vec::with_capacity(d.len());
            for (k, val) in d.iter() {
                keys.push(out.len());
                out.push(Flat::Key(k));
                vals.push(flatten(val, out));
            }
            out[idx] = Flat::Dict(keys, vals);
        }
        _ => {}
    }
    idx
}

fn min_bytes(n: u64) -> usize {
    match n {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFFFF_FFFF => 4,
        _ => 8,
    }
}

struct Writer {
    out: Vec<u8>,
    ref_size: usize,
}

impl Writer {
    fn push(&mut self, b: u8) {
        self.out.push(b);
    }

    fn sized(&mut self, v: u64, n: usize) {
        self.out.extend_from_slice(&v.to_be_bytes()[8 - n..]);
    }

    fn marker(&mut self, kind: u8, count: usize) {
        if count < 0x0F {
            self.push(kind << 4 | count as u8);
        } else {
            self.push(kind << 4 | 0x0F);
            self.int(count as i128);
        }
    }

    fn int(&mut self, n: i128) {
        match n {
            0..=0xFF => {
                self.push(0x10);
                self.sized(n as u64, 1);
            }
            0x100..=0xFFFF => {
                self.push(0x11);
                self.sized(n as u64, 2);
            }
            0x1_0000..=0xFFFF_FFFF => {
                self.push(0x12);
                self.sized(n as u64, 4);
            }
            _ if i64::try_from(n).is_ok() => {
                self.push(0x13);
                self.out.extend_from_slice(&(n as i64).to_be_bytes());
            }
            _ => {
                self.push(0x14);
                self.out.extend_from_slice(&n.to_be_bytes());
            }
        }
    }

    fn str(&mut self, s: &str) {
        if s.is_ascii() {
            self.marker(0x5, s.len());
            self.out.extend_from_slice(s.as_bytes());
        } else {
            let wide: Vec<u16> = s.encode_utf16().collect();
            self.marker(0x6, wide.len());
            for unit in wide {
                self.out.extend_from_slice(&unit.to_be_bytes());
            }
        }
    }

    fn refs(&mut self, refs: &[usize]) {
        for &r in refs {
            self.sized(r as u64, self.ref_size);
        }
    }

    fn object(&mut self, obj: &Flat<'_>) {
        match obj {
            Flat::Key(k) => self.str(k),
            Flat::Array(refs) => {
                self.marker(0xA, refs.len());
                self.refs(refs);
            }
            Flat::Dict(keys, vals) => {
                self.marker(0xD, keys.len());
                self.refs(keys);
                self.refs(vals);
            }
            Flat::Scalar(v) => match v {
                Value::String(s) => self.str(s),
                Value::Integer(n) => self.int(*n),
                Value::Real(r) => {
                    self.push(0x23);
                    self.out.extend_from_slice(&r.to_bits().to_be_bytes());
                }
                Value::Boolean(b) => self.push(if *b { 0x09 } else { 0x08 }),
                Value::Date(d) => {
                    self.push(0x33);
                    self.out.extend_from_slice(&d.0.to_bits().to_be_bytes());
                }
                Value::Data(bytes) => {
                    self.marker(0x4, bytes.len());
                    self.out.extend_from_slice(bytes);
                }
                Value::Uid(id) => {
                    self.push(0x87);
                    self.out.extend_from_slice(&id.to_be_bytes());
                }
                // Containers are always flattened into Array/Dict entries.
                Value::Array(_) | Value::Dictionary(_) => {}
            },
        }
    }
}

/// XML plist with Apple's header and tab indentation.
///
/// Fails on strings holding characters XML 1.0 forbids and on dates that
/// have no calendar form.
pub fn encode_xml(root: &Value) -> Result<String, EncodeError> {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \
         \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
         <plist version=\"1.0\">\n",
    );
    write_xml(root, 0, &mut out)?;
    out.push_str("</plist>\n");
    Ok(out)
}

fn write_xml(v: &Value, indent: usize, out: &mut String) -> Result<(), EncodeError> {
    let pad = "\t".repeat(indent);
    match v {
        Value::String(s) => {
            let _ = writeln!(out, "{pad}<string>{}</string>", escape_xml(s)?);
        }
        Value::Integer(n) => {
            let _ = writeln!(out, "{pad}<integer>{n}</integer>");
        }
        Value::Real(r) => {
            let _ = writeln!(out, "{pad}<real>{r}</real>");
        }
        Value::Boolean(b) => {
            let _ = writeln!(out, "{pad}<{b}/>");
        }
        Value::Date(d) => {
            let text = d
                .to_chrono()
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
                .ok_or_else(|| EncodeError::Unrepresentable(format!("date {}", d.0)))?;
            let _ = writeln!(out, "{pad}<date>{text}</date>");
        }
        Value::Data(bytes) => {
            let _ = writeln!(out, "{pad}<data>{}</data>", BASE64.encode(bytes));
        }
        Value::Uid(id) => {
            let _ = writeln!(
                out,
                "{pad}<dict>\n{pad}\t<key>CF$UID</key>\n{pad}\t<integer>{id}</integer>\n{pad}</dict>"
            );
        }
        Value::Array(items) => {
            let _ = writeln!(out, "{pad}<array>");
            for it in items {
                write_xml(it, indent + 1, out)?;
            }
            let _ = writeln!(out, "{pad}</array>");
        }
        Value::Dictionary(d) => {
            let _ = writeln!(out, "{pad}<dict>");
            for (k, val) in d.iter() {
                let _ = writeln!(out, "{pad}\t<key>{}</key>", escape_xml(k)?);
                write_xml(val, indent + 1, out)?;
            }
            let _ = writeln!(out, "{pad}</dict>");
        }
    }
    Ok(())
}

// A literal CR would be folded into LF by any conforming reader.
fn escape_xml(s: &str) -> Result<String, EncodeError> {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            '\t' | '\n' => out.push(ch),
            c if c < ' ' || c == '\u{FFFE}' || c == '\u{FFFF}' => {
                return Err(EncodeError::Unrepresentable(format!(
                    "character U+{:04X}",
                    c as u32
                )));
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

/// A small Safari-style bookmarks tree: a bar with one link, a folder with a
/// nested link, and an empty reading list.
pub fn sample_bookmarks() -> Value {
    fn leaf(title: &str, url: &str) -> Value {
        let uri: Dictionary = [("title", Value::from(title))].into_iter().collect();
        let node: Dictionary = [
            ("URIDictionary", Value::Dictionary(uri)),
            ("URLString", Value::from(url)),
            ("WebBookmarkType", Value::from("WebBookmarkTypeLeaf")),
        ]
        .into_iter()
        .collect();
        Value::Dictionary(node)
    }
    fn folder(title: &str, children: Vec<Value>) -> Dictionary {
        [
            ("Title", Value::from(title)),
            ("WebBookmarkType", Value::from("WebBookmarkTypeList")),
            ("Children", Value::Array(children)),
        ]
        .into_iter()
        .collect()
    }
    let bar = folder(
        "BookmarksBar",
        vec![
            leaf("Rust", "https://www.rust-lang.org/"),
            Value::Dictionary(folder(
                "Docs",
                vec![leaf("std", "https://doc.rust-lang.org/std/")],
            )),
        ],
    );
    let reading_list = folder("com.apple.ReadingList", vec![]);
    let mut root = folder(
        "",
        vec![Value::Dictionary(bar), Value::Dictionary(reading_list)],
    );
    root.insert("WebBookmarkFileVersion", Value::Integer(1));
    Value::Dictionary(root)
}
