//! Core data models used throughout rowlift.
//!
//! These types represent the decoded rows and their identifiers as they flow
//! from the statement decoder, through fixups, to the remote uploader.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A single typed column value decoded from an INSERT literal.
///
/// Serializes to the natural JSON form (`null`, number, string), which is
/// exactly what the remote write endpoint expects. Deserializes from the
/// scalar forms TOML can express, so fixup rules can name values directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Float(x) => write!(f, "{}", x),
            SqlValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One decoded row: column name → value, in column order.
///
/// Keys are unique; inserting an existing column replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, SqlValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) {
        let column = column.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut SqlValue> {
        self.fields
            .iter_mut()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// The identifier of this record under `id_column`, if it has a usable one.
    pub fn key(&self, id_column: &str) -> Option<RecordKey> {
        self.get(id_column).and_then(RecordKey::from_value)
    }
}

impl FromIterator<(String, SqlValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// A primary-key value, as used for the remote membership test.
///
/// Text in canonical integer form (`"5"`, `"-12"`, not `"007"`) is stored as
/// [`RecordKey::Int`], so a quoted numeric id in an export matches the
/// integer the destination returns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    Int(i64),
    Text(String),
}

impl RecordKey {
    /// Key of a decoded value. Null and float values are not identifiers.
    pub fn from_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Integer(i) => Some(RecordKey::Int(*i)),
            SqlValue::Text(s) => Some(RecordKey::from_text(s)),
            SqlValue::Null | SqlValue::Float(_) => None,
        }
    }

    /// Key of a value returned by the remote read endpoint.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(RecordKey::Int),
            serde_json::Value::String(s) => Some(RecordKey::from_text(s)),
            _ => None,
        }
    }

    fn from_text(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(i) if i.to_string() == s => RecordKey::Int(i),
            _ => RecordKey::Text(s.to_string()),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Int(i) => write!(f, "{}", i),
            RecordKey::Text(s) => write!(f, "{}", s),
        }
    }
}
