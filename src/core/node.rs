//! Purpose: Input boundary of the codec: a parser-agnostic view over parsed JSON nodes.
//! Exports: `JsonNode`, `Node`, `Number`.
//! Role: Lets `codec::from_json` read any parser's tree; implemented for `serde_json::Value`
//! and for the crate's raw parse tree used by the text entry points.
//! Invariants: Arrays and objects enumerate children in source order.
//! Invariants: The raw parse tree keeps duplicate object keys so the codec can reject them.

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::Value;
use std::fmt;

/// One parsed JSON element, as seen by the codec.
pub enum Node<'a, N: 'a> {
    Null,
    Bool(bool),
    Number(Number),
    String(&'a str),
    Array(Box<dyn ExactSizeIterator<Item = &'a N> + 'a>),
    Object(Box<dyn Iterator<Item = (&'a str, &'a N)> + 'a>),
    /// A kind outside the JSON grammar; the name is reported in the error.
    Unsupported(&'static str),
}

/// A JSON number queryable as an exact integer and as a double.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Number {
    int: Option<i64>,
    float: Option<f64>,
}

impl Number {
    pub fn new(int: Option<i64>, float: Option<f64>) -> Self {
        Self { int, float }
    }

    /// `None` when the number is fractional or outside the i64 range.
    pub fn as_i64(&self) -> Option<i64> {
        self.int
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.float
    }
}

impl From<&serde_json::Number> for Number {
    fn from(number: &serde_json::Number) -> Self {
        Number::new(number.as_i64(), number.as_f64())
    }
}

pub trait JsonNode: Sized {
    fn node(&self) -> Node<'_, Self>;
}

impl JsonNode for Value {
    fn node(&self) -> Node<'_, Self> {
        match self {
            Value::Null => Node::Null,
            Value::Bool(value) => Node::Bool(*value),
            Value::Number(number) => Node::Number(number.into()),
            Value::String(text) => Node::String(text),
            Value::Array(items) => Node::Array(Box::new(items.iter())),
            Value::Object(map) => {
                Node::Object(Box::new(map.iter().map(|(key, value)| (key.as_str(), value))))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum RawNode {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<RawNode>),
    Object(Vec<(String, RawNode)>),
}

impl JsonNode for RawNode {
    fn node(&self) -> Node<'_, Self> {
        match self {
            RawNode::Null => Node::Null,
            RawNode::Bool(value) => Node::Bool(*value),
            RawNode::Number(number) => Node::Number(*number),
            RawNode::String(text) => Node::String(text),
            RawNode::Array(items) => Node::Array(Box::new(items.iter())),
            RawNode::Object(members) => {
                Node::Object(Box::new(members.iter().map(|(key, value)| (key.as_str(), value))))
            }
        }
    }
}

struct RawNodeVisitor;

impl<'de> Visitor<'de> for RawNodeVisitor {
    type Value = RawNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<RawNode, E> {
        Ok(RawNode::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<RawNode, E> {
        Ok(RawNode::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<RawNode, D::Error> {
        RawNode::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<RawNode, E> {
        Ok(RawNode::Bool(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<RawNode, E> {
        Ok(RawNode::Number(Number::new(Some(value), Some(value as f64))))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<RawNode, E> {
        Ok(RawNode::Number(Number::new(
            i64::try_from(value).ok(),
            Some(value as f64),
        )))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<RawNode, E> {
        Ok(RawNode::Number(Number::new(None, Some(value))))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<RawNode, E> {
        Ok(RawNode::String(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<RawNode, E> {
        Ok(RawNode::String(value))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RawNode, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(RawNode::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawNode, A::Error> {
        let mut members = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(entry) = map.next_entry::<String, RawNode>()? {
            members.push(entry);
        }
        Ok(RawNode::Object(members))
    }
}

impl<'de> Deserialize<'de> for RawNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawNodeVisitor)
    }
}
