//! Purpose: Dynamic JSON value bridge: parsed JSON nodes to `DynamicValue` and back.
//! Exports: `from_json`, `to_json`, text/`serde_json::Value` helpers, `CodecOptions`.
//! Role: The only conversion path between schema-less payloads and `DynamicValue`.
//! Invariants: Numbers become `Integer` whenever they fit i64, `Float` otherwise.
//! Invariants: Date-time promotion happens on read only; writes are type-directed.
//! Invariants: Duplicate object keys are rejected; nesting beyond `max_depth` is rejected.
//! Invariants: Conversion is all-or-nothing; errors carry the JSON path and depth.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use crate::core::node::{JsonNode, Node, Number, RawNode};
use crate::core::sink::{JsonSink, JsonWriter, ValueBuilder};
use crate::core::timestamp::{format_timestamp, parse_timestamp};
use crate::core::value::{DynamicMap, DynamicValue};
use std::fmt::Write as _;
use std::io;

pub const DEFAULT_MAX_DEPTH: usize = 128;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CodecOptions {
    /// Maximum number of nested arrays/objects; the root container is the first level.
    pub max_depth: usize,
    /// Read date-time strings as `Timestamp`. Off when the input came from typed fields.
    pub promote_timestamps: bool,
}

impl CodecOptions {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            promote_timestamps: true,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_timestamp_promotion(mut self, enabled: bool) -> Self {
        self.promote_timestamps = enabled;
        self
    }
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

/// Location of the node being converted, rendered as `$.args.nested[2]` in errors.
#[derive(Default)]
struct JsonPath<'a> {
    segments: Vec<Segment<'a>>,
}

impl<'a> JsonPath<'a> {
    fn push(&mut self, segment: Segment<'a>) {
        self.segments.push(segment);
    }

    fn pop(&mut self) {
        self.segments.pop();
    }

    fn render(&self) -> String {
        let mut out = String::from("$");
        for segment in &self.segments {
            match segment {
                Segment::Index(index) => {
                    let _ = write!(out, "[{index}]");
                }
                Segment::Key(key) if is_plain_key(key) => {
                    out.push('.');
                    out.push_str(key);
                }
                Segment::Key(key) => {
                    let quoted = serde_json::to_string(key).unwrap_or_default();
                    let _ = write!(out, "[{quoted}]");
                }
            }
        }
        out
    }

    fn error(&self, kind: ErrorKind, message: impl Into<String>) -> Error {
        Error::new(kind)
            .with_message(message)
            .with_path(self.render())
            .with_depth(self.segments.len())
    }
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn from_json<N: JsonNode>(node: &N) -> Result<DynamicValue, Error> {
    from_json_with(node, CodecOptions::default())
}

pub fn from_json_with<N: JsonNode>(node: &N, options: CodecOptions) -> Result<DynamicValue, Error> {
    let mut path = JsonPath::default();
    read_node(node, options, &mut path)
}

fn read_node<'a, N: JsonNode>(
    node: &'a N,
    options: CodecOptions,
    path: &mut JsonPath<'a>,
) -> Result<DynamicValue, Error> {
    match node.node() {
        Node::Null => Ok(DynamicValue::Null),
        Node::Bool(value) => Ok(DynamicValue::Bool(value)),
        Node::Number(number) => read_number(number)
            .ok_or_else(|| path.error(ErrorKind::UnsupportedNode, "number has no 64-bit form")),
        Node::String(text) if options.promote_timestamps => Ok(read_string(text)),
        Node::String(text) => Ok(DynamicValue::String(text.to_string())),
        Node::Array(items) => {
            ensure_depth(path, options.max_depth)?;
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.enumerate() {
                path.push(Segment::Index(index));
                out.push(read_node(item, options, path)?);
                path.pop();
            }
            Ok(DynamicValue::Array(out))
        }
        Node::Object(members) => {
            ensure_depth(path, options.max_depth)?;
            let mut map = DynamicMap::new();
            for (key, member) in members {
                path.push(Segment::Key(key));
                if map.contains_key(key) {
                    return Err(path.error(
                        ErrorKind::DuplicateKey,
                        format!("duplicate object key {key:?}"),
                    ));
                }
                let value = read_node(member, options, path)?;
                map.insert(key.to_string(), value);
                path.pop();
            }
            Ok(DynamicValue::Object(map))
        }
        Node::Unsupported(kind) => Err(path.error(
            ErrorKind::UnsupportedNode,
            format!("unsupported node kind: {kind}"),
        )),
    }
}

fn read_number(number: Number) -> Option<DynamicValue> {
    match number.as_i64() {
        Some(value) => Some(DynamicValue::Integer(value)),
        None => number.as_f64().map(DynamicValue::Float),
    }
}

fn read_string(text: &str) -> DynamicValue {
    match parse_timestamp(text) {
        Some(timestamp) => DynamicValue::Timestamp(timestamp),
        None => DynamicValue::String(text.to_string()),
    }
}

fn ensure_depth(path: &JsonPath<'_>, max_depth: usize) -> Result<(), Error> {
    if path.segments.len() >= max_depth {
        return Err(path.error(
            ErrorKind::TooDeep,
            format!("nesting deeper than {max_depth} levels"),
        ));
    }
    Ok(())
}

pub fn to_json<S: JsonSink + ?Sized>(value: &DynamicValue, sink: &mut S) -> Result<(), Error> {
    to_json_with(value, sink, CodecOptions::default())
}

pub fn to_json_with<S: JsonSink + ?Sized>(
    value: &DynamicValue,
    sink: &mut S,
    options: CodecOptions,
) -> Result<(), Error> {
    let mut path = JsonPath::default();
    write_value(value, sink, options.max_depth, &mut path)
}

fn write_value<'v, S: JsonSink + ?Sized>(
    value: &'v DynamicValue,
    sink: &mut S,
    max_depth: usize,
    path: &mut JsonPath<'v>,
) -> Result<(), Error> {
    match value {
        DynamicValue::Null => sink.write_null().map_err(|err| sink_error(path, err)),
        DynamicValue::Bool(flag) => sink.write_bool(*flag).map_err(|err| sink_error(path, err)),
        DynamicValue::String(text) => sink.write_str(text).map_err(|err| sink_error(path, err)),
        DynamicValue::Integer(number) => {
            sink.write_i64(*number).map_err(|err| sink_error(path, err))
        }
        DynamicValue::Float(number) if number.is_finite() => {
            sink.write_f64(*number).map_err(|err| sink_error(path, err))
        }
        DynamicValue::Float(number) => Err(path.error(
            ErrorKind::Unrepresentable,
            format!("float {number} has no JSON representation"),
        )),
        DynamicValue::Timestamp(timestamp) => {
            let text = format_timestamp(timestamp).map_err(|err| {
                path.error(ErrorKind::Unrepresentable, "timestamp cannot be formatted")
                    .with_source(err)
            })?;
            sink.write_str(&text).map_err(|err| sink_error(path, err))
        }
        DynamicValue::Array(items) => {
            ensure_depth(path, max_depth)?;
            sink.begin_array().map_err(|err| sink_error(path, err))?;
            for (index, item) in items.iter().enumerate() {
                path.push(Segment::Index(index));
                write_value(item, sink, max_depth, path)?;
                path.pop();
            }
            sink.end_array().map_err(|err| sink_error(path, err))
        }
        DynamicValue::Object(map) => {
            ensure_depth(path, max_depth)?;
            sink.begin_object().map_err(|err| sink_error(path, err))?;
            for (key, member) in map {
                path.push(Segment::Key(key));
                sink.write_key(key).map_err(|err| sink_error(path, err))?;
                write_value(member, sink, max_depth, path)?;
                path.pop();
            }
            sink.end_object().map_err(|err| sink_error(path, err))
        }
    }
}

fn sink_error(path: &JsonPath<'_>, err: io::Error) -> Error {
    path.error(ErrorKind::Io, "failed to write json")
        .with_source(err)
}

pub fn from_str(text: &str) -> Result<DynamicValue, Error> {
    from_str_with(text, CodecOptions::default())
}

pub fn from_str_with(text: &str, options: CodecOptions) -> Result<DynamicValue, Error> {
    let raw: RawNode = serde_json::from_str(text).map_err(decode_error)?;
    from_json_with(&raw, options)
}

pub fn from_slice(bytes: &[u8]) -> Result<DynamicValue, Error> {
    from_slice_with(bytes, CodecOptions::default())
}

pub fn from_slice_with(bytes: &[u8], options: CodecOptions) -> Result<DynamicValue, Error> {
    let raw: RawNode = serde_json::from_slice(bytes).map_err(decode_error)?;
    from_json_with(&raw, options)
}

/// Converts an already-parsed `serde_json::Value`. Duplicate keys were collapsed by
/// serde_json before this point; use `from_str` to have them rejected.
pub fn from_value(value: &serde_json::Value) -> Result<DynamicValue, Error> {
    from_json(value)
}

pub fn to_value(value: &DynamicValue) -> Result<serde_json::Value, Error> {
    let mut builder = ValueBuilder::new();
    to_json(value, &mut builder)?;
    builder
        .finish()
        .ok_or_else(|| Error::new(ErrorKind::Internal).with_message("no value was produced"))
}

pub fn to_writer<W: io::Write>(writer: W, value: &DynamicValue) -> Result<(), Error> {
    let mut writer = JsonWriter::new(writer);
    to_json(value, &mut writer)
}

pub fn to_writer_pretty<W: io::Write>(writer: W, value: &DynamicValue) -> Result<(), Error> {
    let mut writer = JsonWriter::pretty(writer);
    to_json(value, &mut writer)
}

pub fn to_string(value: &DynamicValue) -> Result<String, Error> {
    let mut out = Vec::new();
    to_writer(&mut out, value)?;
    into_string(out)
}

pub fn to_string_pretty(value: &DynamicValue) -> Result<String, Error> {
    let mut out = Vec::new();
    to_writer_pretty(&mut out, value)?;
    into_string(out)
}

fn into_string(bytes: Vec<u8>) -> Result<String, Error> {
    String::from_utf8(bytes).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("json output was not utf-8")
            .with_source(err)
    })
}

fn decode_error(err: serde_json::Error) -> Error {
    // serde_json stops at its own nesting ceiling before the codec guard sees the tree.
    let kind = if err.to_string().starts_with("recursion limit exceeded") {
        ErrorKind::TooDeep
    } else {
        ErrorKind::Decode
    };
    Error::new(kind)
        .with_message(format!("invalid json: {err}"))
        .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::{CodecOptions, from_json, from_str, to_json, to_string, to_value};
    use crate::core::error::ErrorKind;
    use crate::core::node::{JsonNode, Node, Number};
    use crate::core::sink::JsonSink;
    use crate::core::value::DynamicValue;
    use serde_json::json;
    use std::io;

    enum TestNode {
        Int(i64),
        Comment,
        Object(Vec<(String, TestNode)>),
    }

    impl JsonNode for TestNode {
        fn node(&self) -> Node<'_, Self> {
            match self {
                TestNode::Int(value) => {
                    Node::Number(Number::new(Some(*value), Some(*value as f64)))
                }
                TestNode::Comment => Node::Unsupported("comment"),
                TestNode::Object(members) => {
                    Node::Object(Box::new(members.iter().map(|(key, value)| (key.as_str(), value))))
                }
            }
        }
    }

    struct FailingSink;

    impl JsonSink for FailingSink {
        fn write_null(&mut self) -> io::Result<()> {
            Err(io::Error::other("closed"))
        }
        fn write_bool(&mut self, _: bool) -> io::Result<()> {
            Err(io::Error::other("closed"))
        }
        fn write_str(&mut self, _: &str) -> io::Result<()> {
            Err(io::Error::other("closed"))
        }
        fn write_i64(&mut self, _: i64) -> io::Result<()> {
            Err(io::Error::other("closed"))
        }
        fn write_f64(&mut self, _: f64) -> io::Result<()> {
            Err(io::Error::other("closed"))
        }
        fn begin_object(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn write_key(&mut self, _: &str) -> io::Result<()> {
            Ok(())
        }
        fn end_object(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn begin_array(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn end_array(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unsupported_node_kind_reports_path() {
        let node = TestNode::Object(vec![
            ("a".to_string(), TestNode::Int(1)),
            ("b".to_string(), TestNode::Comment),
        ]);
        let err = from_json(&node).expect_err("unsupported");
        assert_eq!(err.kind(), ErrorKind::UnsupportedNode);
        assert_eq!(err.path(), Some("$.b"));
        assert_eq!(err.depth(), Some(1));
    }

    #[test]
    fn duplicate_keys_from_any_node_source_are_rejected() {
        let node = TestNode::Object(vec![
            ("x".to_string(), TestNode::Int(1)),
            ("x".to_string(), TestNode::Int(2)),
        ]);
        let err = from_json(&node).expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::DuplicateKey);
        assert_eq!(err.path(), Some("$.x"));
    }

    #[test]
    fn path_quotes_keys_that_are_not_identifiers() {
        let err = from_str(r#"{"policy args":{"k":[1,{"a":1,"a":2}]}}"#).expect_err("duplicate");
        assert_eq!(err.path(), Some(r#"$["policy args"].k[1].a"#));
        assert_eq!(err.depth(), Some(4));
    }

    #[test]
    fn depth_limit_counts_containers() {
        let options = CodecOptions::new().with_max_depth(2);
        assert!(super::from_str_with("[[1]]", options).is_ok());
        let err = super::from_str_with("[[[1]]]", options).expect_err("too deep");
        assert_eq!(err.kind(), ErrorKind::TooDeep);
        assert_eq!(err.path(), Some("$[0][0]"));
    }

    #[test]
    fn parser_nesting_ceiling_is_reported_as_too_deep() {
        let text = format!("{}{}", "[".repeat(300), "]".repeat(300));
        let err = from_str(&text).expect_err("too deep");
        assert_eq!(err.kind(), ErrorKind::TooDeep);
    }

    #[test]
    fn timestamp_promotion_can_be_turned_off() {
        let options = CodecOptions::new().with_timestamp_promotion(false);
        let value = super::from_json_with(&json!({"name": "2013-08-05 11:09:48"}), options)
            .expect("decode");
        assert_eq!(
            value.get("name"),
            Some(&DynamicValue::String("2013-08-05 11:09:48".to_string()))
        );
        assert_eq!(
            to_string(&value).expect("encode"),
            r#"{"name":"2013-08-05 11:09:48"}"#
        );
    }

    #[test]
    fn scalars_do_not_count_toward_depth() {
        let options = CodecOptions::new().with_max_depth(0);
        assert_eq!(
            super::from_str_with("7", options).expect("scalar"),
            DynamicValue::Integer(7)
        );
    }

    #[test]
    fn write_depth_limit_applies_to_built_values() {
        let value = DynamicValue::Array(vec![DynamicValue::Array(vec![])]);
        let mut out = Vec::new();
        let mut writer = crate::core::sink::JsonWriter::new(&mut out);
        let err = super::to_json_with(&value, &mut writer, CodecOptions::new().with_max_depth(1))
            .expect_err("too deep");
        assert_eq!(err.kind(), ErrorKind::TooDeep);
    }

    #[test]
    fn non_finite_float_is_unrepresentable() {
        let value = DynamicValue::Array(vec![DynamicValue::Float(f64::INFINITY)]);
        let err = to_string(&value).expect_err("infinity");
        assert_eq!(err.kind(), ErrorKind::Unrepresentable);
        assert_eq!(err.path(), Some("$[0]"));
    }

    #[test]
    fn sink_failures_surface_as_io() {
        let value: DynamicValue = [("k", DynamicValue::Null)].into_iter().collect();
        let err = to_json(&value, &mut FailingSink).expect_err("sink");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.path(), Some("$.k"));
    }

    #[test]
    fn malformed_text_is_a_decode_error() {
        let err = from_str("{\"a\":").expect_err("truncated");
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn to_value_keeps_integers_and_renders_timestamps() {
        let value = from_str(r#"{"n":10,"at":"2023-11-05 10:15:30","f":0.5}"#).expect("parse");
        assert_eq!(
            to_value(&value).expect("value"),
            json!({"n": 10, "at": "2023-11-05T10:15:30Z", "f": 0.5})
        );
    }
}
