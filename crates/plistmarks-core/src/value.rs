// Decoded property-list tree: one tagged variant per plist kind
use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z.
pub const REFERENCE_EPOCH_UNIX: i64 = 978_307_200;

/// A plist date: seconds relative to 2001-01-01T00:00:00Z.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Date(pub f64);

impl Date {
    pub fn to_chrono(self) -> Option<DateTime<Utc>> {
        if !self.0.is_finite() {
            return None;
        }
        let whole = self.0.floor();
        let nanos = (((self.0 - whole) * 1e9).round() as u32).min(999_999_999);
        let unix = (whole as i64).checked_add(REFERENCE_EPOCH_UNIX)?;
        DateTime::from_timestamp(unix, nanos)
    }

    pub fn from_chrono(dt: DateTime<Utc>) -> Self {
        let secs = (dt.timestamp() - REFERENCE_EPOCH_UNIX) as f64;
        Date(secs + f64::from(dt.timestamp_subsec_nanos()) / 1e9)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i128),
    Real(f64),
    Boolean(bool),
    Date(Date),
    Data(Vec<u8>),
    /// Keyed-archiver object reference (binary plists only).
    Uid(u64),
    Array(Vec<Value>),
    Dictionary(Dictionary),
}

impl Value {
    /// Short kind name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::Data(_) => "data",
            Value::Uid(_) => "uid",
            Value::Array(_) => "array",
            Value::Dictionary(_) => "dictionary",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Member lookup when `self` is a dictionary.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dictionary().and_then(|d| d.get(key))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Dictionary> for Value {
    fn from(d: Dictionary) -> Self {
        Value::Dictionary(d)
    }
}

/// Insertion-ordered string-keyed map. Re-inserting a key replaces its value
/// in place, so the last duplicate wins while the first position is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        if let Some(&i) = self.index.get(&key) {
            return Some(std::mem::replace(&mut self.entries[i].1, value));
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        None
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut d = Dictionary::new();
        for (k, v) in iter {
            d.insert(k, v);
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_keeps_position_and_last_value() {
        let mut d = Dictionary::new();
        d.insert("Title", "first".into());
        d.insert("URLString", "https://a".into());
        let old = d.insert("Title", "second".into());
        assert_eq!(old, Some(Value::from("first")));
        let keys: Vec<&str> = d.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["Title", "URLString"]);
        assert_eq!(d.get("Title").and_then(Value::as_str), Some("second"));
    }

    #[test]
    fn reference_date_maps_to_2001() {
        let dt = Date(0.0).to_chrono().unwrap();
        assert_eq!(dt.to_rfc3339(), "2001-01-01T00:00:00+00:00");
        assert_eq!(Date::from_chrono(dt), Date(0.0));
        assert!(Date(f64::NAN).to_chrono().is_none());
    }
}
