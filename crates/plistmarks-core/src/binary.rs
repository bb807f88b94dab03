// Binary property-list (`bplist00`) reader
//
// Layout: 8-byte magic, object table, offset table, 32-byte trailer.
// All multi-byte integers are big-endian.
use crate::error::DecodeError;
use crate::value::{Date, Dictionary, Value};

pub const MAGIC: &[u8; 8] = b"bplist00";
const TRAILER_LEN: usize = 32;

#[derive(Debug, Clone, Copy)]
struct Trailer {
    ref_size: usize,
    num_objects: usize,
    top_object: usize,
    offset_table: usize,
}

#[derive(Debug)]
pub struct Parser<'a> {
    data: &'a [u8],
    trailer: Trailer,
    offsets: Vec<usize>,
    max_depth: usize,
    budget: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Marker {
    Singleton = 0x0,
    Int = 0x1,
    Real = 0x2,
    Date = 0x3,
    Data = 0x4,
    AsciiString = 0x5,
    Utf16String = 0x6,
    Uid = 0x8,
    Array = 0xA,
    Dict = 0xD,
}

impl Marker {
    fn from_nibble(n: u8) -> Option<Self> {
        let m = match n {
            0x0 => Marker::Singleton,
            0x1 => Marker::Int,
            0x2 => Marker::Real,
            0x3 => Marker::Date,
            0x4 => Marker::Data,
            0x5 => Marker::AsciiString,
            0x6 => Marker::Utf16String,
            0x8 => Marker::Uid,
            0xA => Marker::Array,
            0xD => Marker::Dict,
            _ => return None,
        };
        Some(m)
    }
}

impl<'a> Parser<'a> {
    /// Validates the header, trailer and offset table.
    pub fn new(data: &'a [u8], max_depth: usize) -> Result<Self, DecodeError> {
        if !data.starts_with(MAGIC) {
            return Err(DecodeError::UnrecognizedFormat);
        }
        if data.len() < MAGIC.len() + TRAILER_LEN {
            return Err(DecodeError::Truncated {
                needed: MAGIC.len() + TRAILER_LEN,
                at: 0,
            });
        }
        let t = &data[data.len() - TRAILER_LEN..];
        let offset_size = t[6] as usize;
        let ref_size = t[7] as usize;
        let num_objects = be_uint(&t[8..16]);
        let top_object = be_uint(&t[16..24]);
        let offset_table = be_uint(&t[24..32]);

        if !(1..=8).contains(&offset_size) || !(1..=8).contains(&ref_size) {
            return Err(DecodeError::InvalidTrailer(format!(
                "offset size {offset_size} / ref size {ref_size}"
            )));
        }
        let body_end = (data.len() - TRAILER_LEN) as u64;
        if num_objects == 0 || top_object >= num_objects {
            return Err(DecodeError::InvalidTrailer(format!(
                "top object {top_object} of {num_objects}"
            )));
        }
        let table_len = num_objects
            .checked_mul(offset_size as u64)
            .ok_or_else(|| DecodeError::InvalidTrailer("object count overflow".into()))?;
        if offset_table < MAGIC.len() as u64
            || offset_table
                .checked_add(table_len)
                .is_none_or(|end| end > body_end)
        {
            return Err(DecodeError::InvalidTrailer(format!(
                "offset table at {offset_table:#x} does not fit"
            )));
        }
        let trailer = Trailer {
            ref_size,
            num_objects: num_objects as usize,
            top_object: top_object as usize,
            offset_table: offset_table as usize,
        };

        let mut offsets = Vec::with_capacity(trailer.num_objects);
        for object in 0..trailer.num_objects {
            let at = trailer.offset_table + object * offset_size;
            let offset = be_uint(&data[at..at + offset_size]) as usize;
            if offset < MAGIC.len() || offset >= trailer.offset_table {
                return Err(DecodeError::InvalidOffset { object, offset });
            }
            offsets.push(offset);
        }

        Ok(Self {
            data,
            trailer,
            offsets,
            max_depth,
            budget: data.len().saturating_mul(4).saturating_add(64),
        })
    }

    pub fn object_count(&self) -> usize {
        self.trailer.num_objects
    }

    pub fn parse(mut self) -> Result<Value, DecodeError> {
        let mut active = vec![false; self.trailer.num_objects];
        self.read_object(self.trailer.top_object, 0, &mut active)
    }

    fn read_object(
        &mut self,
        object: usize,
        depth: usize,
        active: &mut [bool],
    ) -> Result<Value, DecodeError> {
        if self.budget == 0 {
            return Err(DecodeError::Expansion {
                limit: self.data.len().saturating_mul(4).saturating_add(64),
            });
        }
        self.budget -= 1;

        let at = self.offsets[object];
        let marker = self.byte(at)?;
        let (hi, lo) = (marker >> 4, marker & 0x0F);
        let kind = Marker::from_nibble(hi).ok_or(DecodeError::UnknownMarker { marker, at })?;
        let v = match kind {
            Marker::Singleton => match lo {
                0x8 => Value::Boolean(false),
                0x9 => Value::Boolean(true),
                _ => return Err(DecodeError::UnknownMarker { marker, at }),
            },
            Marker::Int => Value::Integer(self.read_int(at, lo)?),
            Marker::Real => match lo {
                2 => Value::Real(f64::from(f32::from_bits(be_uint(self.slice(at + 1, 4)?) as u32))),
                3 => Value::Real(f64::from_bits(be_uint(self.slice(at + 1, 8)?))),
                _ => return Err(DecodeError::UnknownMarker { marker, at }),
            },
            Marker::Date => {
                if lo != 3 {
                    return Err(DecodeError::UnknownMarker { marker, at });
                }
                Value::Date(Date(f64::from_bits(be_uint(self.slice(at + 1, 8)?))))
            }
            Marker::Data => {
                let (len, start) = self.read_count(at, lo)?;
                Value::Data(self.slice(start, len)?.to_vec())
            }
            Marker::AsciiString => {
                let (len, start) = self.read_count(at, lo)?;
                let bytes = self.slice(start, len)?;
                if let Some(i) = bytes.iter().position(|b| !b.is_ascii()) {
                    return Err(DecodeError::InvalidString(format!(
                        "non-ASCII byte {:#04x} at {:#x}",
                        bytes[i],
                        start + i
                    )));
                }
                Value::String(bytes.iter().map(|&b| b as char).collect())
            }
            Marker::Utf16String => {
                let (units, start) = self.read_count(at, lo)?;
                let bytes = self.slice(start, units.checked_mul(2).ok_or(DecodeError::Truncated {
                    needed: usize::MAX,
                    at: start,
                })?)?;
                let wide: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                let s = String::from_utf16(&wide)
                    .map_err(|e| DecodeError::InvalidString(format!("{e} at {at:#x}")))?;
                Value::String(s)
            }
            Marker::Uid => {
                let n = lo as usize + 1;
                if n > 8 {
                    return Err(DecodeError::UnknownMarker { marker, at });
                }
                Value::Uid(be_uint(self.slice(at + 1, n)?))
            }
            Marker::Array => {
                let (count, start) = self.read_count(at, lo)?;
                let refs = self.read_refs(start, count)?;
                self.enter(object, depth, active)?;
                let mut items = Vec::with_capacity(refs.len());
                for r in refs {
                    items.push(self.read_object(r, depth + 1, active)?);
                }
                active[object] = false;
                Value::Array(items)
            }
            Marker::Dict => {
                let (count, start) = self.read_count(at, lo)?;
                let keys = self.read_refs(start, count)?;
                let vals = self.read_refs(start + count * self.trailer.ref_size, count)?;
                self.enter(object, depth, active)?;
                let mut dict = Dictionary::new();
                for (k, v) in keys.into_iter().zip(vals) {
                    let key = match self.read_object(k, depth + 1, active)? {
                        Value::String(s) => s,
                        _ => return Err(DecodeError::NonStringKey),
                    };
                    let value = self.read_object(v, depth + 1, active)?;
                    dict.insert(key, value);
                }
                active[object] = false;
                Value::Dictionary(dict)
            }
        };
        Ok(v)
    }

    fn enter(&self, object: usize, depth: usize, active: &mut [bool]) -> Result<(), DecodeError> {
        if active[object] {
            return Err(DecodeError::Cycle { object });
        }
        if depth >= self.max_depth {
            return Err(DecodeError::TooDeep {
                limit: self.max_depth,
            });
        }
        active[object] = true;
        Ok(())
    }

    // 1, 2 and 4-byte integers are unsigned; 8 and 16-byte are signed.
    fn read_int(&self, at: usize, lo: u8) -> Result<i128, DecodeError> {
        let n = match lo {
            0..=3 => 1usize << lo,
            4 => 16,
            _ => {
                return Err(DecodeError::UnknownMarker {
                    marker: 0x10 | lo,
                    at,
                });
            }
        };
        let bytes = self.slice(at + 1, n)?;
        Ok(match n {
            8 => i128::from(be_uint(bytes) as i64),
            16 => {
                let mut buf = [0u8; 16];
                buf.copy_from_slice(bytes);
                i128::from_be_bytes(buf)
            }
            _ => i128::from(be_uint(bytes)),
        })
    }

    // Returns (count, offset of the payload that follows).
    fn read_count(&self, at: usize, lo: u8) -> Result<(usize, usize), DecodeError> {
        if lo != 0x0F {
            return Ok((lo as usize, at + 1));
        }
        let marker = self.byte(at + 1)?;
        if marker >> 4 != Marker::Int as u8 || marker & 0x0F > 3 {
            return Err(DecodeError::UnknownMarker { marker, at: at + 1 });
        }
        let n = 1usize << (marker & 0x0F);
        let count = be_uint(self.slice(at + 2, n)?);
        let count = usize::try_from(count)
            .map_err(|_| DecodeError::Malformed(format!("count {count} at {at:#x}")))?;
        Ok((count, at + 2 + n))
    }

    fn read_refs(&self, at: usize, count: usize) -> Result<Vec<usize>, DecodeError> {
        let size = self.trailer.ref_size;
        let bytes = self.slice(
            at,
            count
                .checked_mul(size)
                .ok_or(DecodeError::Truncated { needed: usize::MAX, at })?,
        )?;
        bytes
            .chunks_exact(size)
            .map(|c| {
                let r = be_uint(c) as usize;
                if r >= self.trailer.num_objects {
                    Err(DecodeError::InvalidReference {
                        reference: r,
                        count: self.trailer.num_objects,
                    })
                } else {
                    Ok(r)
                }
            })
            .collect()
    }

    // Low-level utilities; objects live between the magic and the offset table.
    fn byte(&self, at: usize) -> Result<u8, DecodeError> {
        Ok(self.slice(at, 1)?[0])
    }

    fn slice(&self, at: usize, len: usize) -> Result<&'a [u8], DecodeError> {
        match at.checked_add(len) {
            Some(end) if end <= self.trailer.offset_table => Ok(&self.data[at..end]),
            _ => Err(DecodeError::Truncated { needed: len, at }),
        }
    }
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::encode_binary;

    // Lays out `objects` in order with 1-byte offsets and refs.
    fn document(objects: &[&[u8]], top: u64) -> Vec<u8> {
        let mut w = MAGIC.to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for obj in objects {
            offsets.push(w.len() as u8);
            w.extend_from_slice(obj);
        }
        let table = w.len();
        w.extend_from_slice(&offsets);
        let mut trailer = [0u8; 32];
        trailer[6] = 1;
        trailer[7] = 1;
        trailer[8..16].copy_from_slice(&(objects.len() as u64).to_be_bytes());
        trailer[16..24].copy_from_slice(&top.to_be_bytes());
        trailer[24..32].copy_from_slice(&(table as u64).to_be_bytes());
        w.extend_from_slice(&trailer);
        w
    }

    fn parse(data: &[u8], max_depth: usize) -> Result<Value, DecodeError> {
        Parser::new(data, max_depth)?.parse()
    }

    #[test]
    fn reads_minimal_document() {
        let data = document(&[&[0x52, b'h', b'i']], 0);
        let parser = Parser::new(&data, 8).unwrap();
        assert_eq!(parser.object_count(), 1);
        assert_eq!(parser.parse().unwrap(), Value::from("hi"));
    }

    #[test]
    fn rejects_offset_table_past_end() {
        let mut data = document(&[&[0x52, b'h', b'i']], 0);
        let n = data.len();
        data[n - 1] = 0xF0;
        assert!(matches!(
            Parser::new(&data, 8),
            Err(DecodeError::InvalidTrailer(_))
        ));
    }

    #[test]
    fn rejects_offset_inside_magic() {
        let mut data = document(&[&[0x09]], 0);
        let n = data.len();
        data[n - TRAILER_LEN - 1] = 3;
        assert!(matches!(
            Parser::new(&data, 8),
            Err(DecodeError::InvalidOffset { object: 0, offset: 3 })
        ));
    }

    #[test]
    fn rejects_string_running_into_offset_table() {
        let data = document(&[&[0x55, b'h', b'i']], 0);
        let err = parse(&data, 8).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn ascii_string_with_high_byte_is_invalid() {
        let data = document(&[&[0x52, b'h', 0xE9]], 0);
        match parse(&data, 8) {
            Err(DecodeError::InvalidString(msg)) => assert!(msg.contains("0xe9"), "{msg}"),
            other => panic!("expected InvalidString, got {other:?}"),
        }
    }

    #[test]
    fn self_referencing_array_is_a_cycle() {
        let data = document(&[&[0xA1, 0x00]], 0);
        let err = parse(&data, 8).unwrap_err();
        assert!(matches!(err, DecodeError::Cycle { object: 0 }));
    }

    #[test]
    fn int_widths() {
        let data = document(&[&[0x11, 0xFF, 0xFE]], 0);
        assert_eq!(parse(&data, 8).unwrap(), Value::Integer(0xFFFE));
    }

    #[test]
    fn every_scalar_kind() {
        let v: Dictionary = [
            ("real", Value::Real(0.1)),
            ("date", Value::Date(Date(-86_400.5))),
            ("data", Value::Data((0u8..20).collect())),
            ("uid", Value::Uid(7)),
            ("yes", Value::Boolean(true)),
            ("no", Value::Boolean(false)),
            ("neg", Value::Integer(-5)),
            ("wide", Value::Integer(1 << 40)),
            ("huge", Value::Integer(i128::from(u64::MAX) + 1)),
        ]
        .into_iter()
        .collect();
        let v = Value::Dictionary(v);
        assert_eq!(parse(&encode_binary(&v), 8).unwrap(), v);
    }

    #[test]
    fn single_precision_real() {
        let mut obj = vec![0x22];
        obj.extend_from_slice(&1.5f32.to_bits().to_be_bytes());
        assert_eq!(parse(&document(&[&obj], 0), 8).unwrap(), Value::Real(1.5));
    }

    #[test]
    fn null_and_fill_markers_are_rejected() {
        for marker in [0x00, 0x0F] {
            let err = parse(&document(&[&[marker]], 0), 8).unwrap_err();
            assert!(matches!(err, DecodeError::UnknownMarker { marker: m, at: 8 } if m == marker));
        }
    }

    #[test]
    fn dictionary_key_must_be_a_string() {
        let data = document(&[&[0xD1, 1, 2], &[0x10, 0x05], &[0x09]], 0);
        assert!(matches!(parse(&data, 8), Err(DecodeError::NonStringKey)));
    }

    #[test]
    fn reference_past_object_count() {
        let data = document(&[&[0xA1, 0x05]], 0);
        assert!(matches!(
            parse(&data, 8),
            Err(DecodeError::InvalidReference { reference: 5, count: 1 })
        ));
    }

    #[test]
    fn shared_arrays_stop_at_the_expansion_budget() {
        // Object i is [i+1, i+1]; the last object is `true`. The tree is
        // 2^40 leaves wide while the file is a few hundred bytes.
        let levels = 40u8;
        let mut objects: Vec<Vec<u8>> = (0..levels).map(|i| vec![0xA2, i + 1, i + 1]).collect();
        objects.push(vec![0x09]);
        let refs: Vec<&[u8]> = objects.iter().map(Vec::as_slice).collect();
        let data = document(&refs, 0);
        let err = parse(&data, 64).unwrap_err();
        assert!(matches!(err, DecodeError::Expansion { limit } if limit == data.len() * 4 + 64));
    }
}
