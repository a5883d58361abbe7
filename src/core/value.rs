//! Purpose: In-memory representation of schema-less JSON (policy arguments, headers, metadata).
//! Exports: `DynamicValue`, `DynamicMap`, `ValueKind`, `deserialize_map`.
//! Role: The value side of the dynamic bridge; `codec` converts to and from JSON.
//! Invariants: A tree is closed under recursion and owns its children exclusively.
//! Invariants: `Integer` and `Float` never merge; `Timestamp` is only produced by reads.
//! Invariants: Object keys keep insertion order.

use crate::core::codec::{self, CodecOptions};
use crate::core::node::RawNode;
use crate::core::timestamp::format_timestamp;
use indexmap::IndexMap;
use serde::de::{Error as DeError, Unexpected};
use serde::ser::{Error as SerError, SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use time::OffsetDateTime;

pub type DynamicMap = IndexMap<String, DynamicValue>;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum DynamicValue {
    #[default]
    Null,
    Bool(bool),
    String(String),
    Integer(i64),
    Float(f64),
    Timestamp(OffsetDateTime),
    Array(Vec<DynamicValue>),
    Object(DynamicMap),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    Null,
    Bool,
    String,
    Integer,
    Float,
    Timestamp,
    Array,
    Object,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Timestamp => "timestamp",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DynamicValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            DynamicValue::Null => ValueKind::Null,
            DynamicValue::Bool(_) => ValueKind::Bool,
            DynamicValue::String(_) => ValueKind::String,
            DynamicValue::Integer(_) => ValueKind::Integer,
            DynamicValue::Float(_) => ValueKind::Float,
            DynamicValue::Timestamp(_) => ValueKind::Timestamp,
            DynamicValue::Array(_) => ValueKind::Array,
            DynamicValue::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DynamicValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Widens `Integer` on request; the stored variant is left untouched.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DynamicValue::Float(value) => Some(*value),
            DynamicValue::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynamicValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<OffsetDateTime> {
        match self {
            DynamicValue::Timestamp(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DynamicValue]> {
        match self {
            DynamicValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&DynamicMap> {
        match self {
            DynamicValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut DynamicMap> {
        match self {
            DynamicValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Member lookup; `None` for missing keys and for non-objects.
    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.as_object().and_then(|map| map.get(key))
    }
}

impl From<bool> for DynamicValue {
    fn from(value: bool) -> Self {
        DynamicValue::Bool(value)
    }
}

impl From<i64> for DynamicValue {
    fn from(value: i64) -> Self {
        DynamicValue::Integer(value)
    }
}

impl From<i32> for DynamicValue {
    fn from(value: i32) -> Self {
        DynamicValue::Integer(i64::from(value))
    }
}

impl From<u32> for DynamicValue {
    fn from(value: u32) -> Self {
        DynamicValue::Integer(i64::from(value))
    }
}

impl From<f64> for DynamicValue {
    fn from(value: f64) -> Self {
        DynamicValue::Float(value)
    }
}

impl From<&str> for DynamicValue {
    fn from(value: &str) -> Self {
        DynamicValue::String(value.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(value: String) -> Self {
        DynamicValue::String(value)
    }
}

impl From<OffsetDateTime> for DynamicValue {
    fn from(value: OffsetDateTime) -> Self {
        DynamicValue::Timestamp(value)
    }
}

impl From<Vec<DynamicValue>> for DynamicValue {
    fn from(items: Vec<DynamicValue>) -> Self {
        DynamicValue::Array(items)
    }
}

impl From<DynamicMap> for DynamicValue {
    fn from(map: DynamicMap) -> Self {
        DynamicValue::Object(map)
    }
}

impl<T: Into<DynamicValue>> From<Option<T>> for DynamicValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(DynamicValue::Null, Into::into)
    }
}

impl FromIterator<DynamicValue> for DynamicValue {
    fn from_iter<I: IntoIterator<Item = DynamicValue>>(iter: I) -> Self {
        DynamicValue::Array(iter.into_iter().collect())
    }
}

impl<K: Into<String>> FromIterator<(K, DynamicValue)> for DynamicValue {
    fn from_iter<I: IntoIterator<Item = (K, DynamicValue)>>(iter: I) -> Self {
        DynamicValue::Object(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Compact JSON text. Unlike `codec::to_string` this never fails: non-finite floats print as
/// `null` and nesting is not bounded.
impl fmt::Display for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicValue::Null => f.write_str("null"),
            DynamicValue::Bool(value) => write!(f, "{value}"),
            DynamicValue::String(text) => write_quoted(f, text),
            DynamicValue::Integer(value) => write!(f, "{value}"),
            DynamicValue::Float(value) => match serde_json::Number::from_f64(*value) {
                Some(number) => write!(f, "{number}"),
                None => f.write_str("null"),
            },
            DynamicValue::Timestamp(timestamp) => match format_timestamp(timestamp) {
                Ok(text) => write_quoted(f, &text),
                Err(_) => write_quoted(f, &timestamp.to_string()),
            },
            DynamicValue::Array(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    fmt::Display::fmt(item, f)?;
                }
                f.write_str("]")
            }
            DynamicValue::Object(map) => {
                f.write_str("{")?;
                for (index, (key, value)) in map.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write_quoted(f, key)?;
                    f.write_str(":")?;
                    fmt::Display::fmt(value, f)?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    // Serializing a str into memory cannot fail.
    f.write_str(&serde_json::to_string(text).unwrap_or_default())
}

// Serialization mirrors `codec::to_json`: type-directed, finite floats only, depth-bounded.
struct Bounded<'a> {
    value: &'a DynamicValue,
    depth: usize,
    max_depth: usize,
}

impl Bounded<'_> {
    fn nested<'b>(&self, value: &'b DynamicValue) -> Bounded<'b> {
        Bounded {
            value,
            depth: self.depth + 1,
            max_depth: self.max_depth,
        }
    }
}

impl Serialize for Bounded<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            DynamicValue::Null => serializer.serialize_unit(),
            DynamicValue::Bool(value) => serializer.serialize_bool(*value),
            DynamicValue::String(value) => serializer.serialize_str(value),
            DynamicValue::Integer(value) => serializer.serialize_i64(*value),
            DynamicValue::Float(value) if value.is_finite() => serializer.serialize_f64(*value),
            DynamicValue::Float(value) => Err(S::Error::custom(format!(
                "float {value} has no JSON representation"
            ))),
            DynamicValue::Timestamp(value) => {
                let text = format_timestamp(value).map_err(S::Error::custom)?;
                serializer.serialize_str(&text)
            }
            DynamicValue::Array(_) | DynamicValue::Object(_) if self.depth >= self.max_depth => Err(
                S::Error::custom(format!("nesting deeper than {}", self.max_depth)),
            ),
            DynamicValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&self.nested(item))?;
                }
                seq.end()
            }
            DynamicValue::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, &self.nested(value))?;
                }
                out.end()
            }
        }
    }
}

impl Serialize for DynamicValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Bounded {
            value: self,
            depth: 0,
            max_depth: CodecOptions::default().max_depth,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DynamicValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawNode::deserialize(deserializer)?;
        codec::from_json(&raw).map_err(D::Error::custom)
    }
}

/// `deserialize_with` helper for model fields holding opaque argument maps.
///
/// The broker reports an empty argument table as `[]` on some endpoints, so an empty array and
/// `null` both become an empty map.
pub fn deserialize_map<'de, D>(deserializer: D) -> Result<DynamicMap, D::Error>
where
    D: Deserializer<'de>,
{
    match DynamicValue::deserialize(deserializer)? {
        DynamicValue::Object(map) => Ok(map),
        DynamicValue::Null => Ok(DynamicMap::new()),
        DynamicValue::Array(items) if items.is_empty() => Ok(DynamicMap::new()),
        other => Err(D::Error::invalid_type(
            Unexpected::Other(other.kind().as_str()),
            &"a JSON object",
        )),
    }
}
