//! Purpose: Output boundary of the codec: streaming JSON sinks.
//! Exports: `JsonSink`, `JsonWriter`, `ValueBuilder`.
//! Role: `codec::to_json` emits events into a sink; `JsonWriter` renders text through any
//! `serde_json::ser::Formatter`, `ValueBuilder` assembles a `serde_json::Value`.
//! Invariants: Sinks never flush or close the underlying writer.
//! Invariants: Misordered events (key outside an object, unbalanced end) fail with
//! `InvalidInput` instead of producing malformed output.

use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use serde_json::{Map, Value};
use std::io::{self, Write};

pub trait JsonSink {
    fn write_null(&mut self) -> io::Result<()>;
    fn write_bool(&mut self, value: bool) -> io::Result<()>;
    fn write_str(&mut self, value: &str) -> io::Result<()>;
    fn write_i64(&mut self, value: i64) -> io::Result<()>;
    fn write_f64(&mut self, value: f64) -> io::Result<()>;
    fn begin_object(&mut self) -> io::Result<()>;
    fn write_key(&mut self, key: &str) -> io::Result<()>;
    fn end_object(&mut self) -> io::Result<()>;
    fn begin_array(&mut self) -> io::Result<()>;
    fn end_array(&mut self) -> io::Result<()>;
}

#[derive(Clone, Copy, Debug)]
enum Frame {
    Array { first: bool },
    Object { first: bool },
}

pub struct JsonWriter<W, F = CompactFormatter> {
    writer: W,
    formatter: F,
    frames: Vec<Frame>,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_formatter(writer, CompactFormatter)
    }
}

impl<'a, W: Write> JsonWriter<W, PrettyFormatter<'a>> {
    pub fn pretty(writer: W) -> Self {
        Self::with_formatter(writer, PrettyFormatter::new())
    }
}

impl<W: Write, F: Formatter> JsonWriter<W, F> {
    pub fn with_formatter(writer: W, formatter: F) -> Self {
        Self {
            writer,
            formatter,
            frames: Vec::new(),
        }
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn before_value(&mut self) -> io::Result<()> {
        if let Some(Frame::Array { first }) = self.frames.last_mut() {
            let was_first = *first;
            *first = false;
            self.formatter.begin_array_value(&mut self.writer, was_first)?;
        }
        Ok(())
    }

    fn after_value(&mut self) -> io::Result<()> {
        match self.frames.last() {
            Some(Frame::Array { .. }) => self.formatter.end_array_value(&mut self.writer),
            Some(Frame::Object { .. }) => self.formatter.end_object_value(&mut self.writer),
            None => Ok(()),
        }
    }

    fn write_quoted(&mut self, text: &str) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, text).map_err(io::Error::from)
    }
}

impl<W: Write, F: Formatter> JsonSink for JsonWriter<W, F> {
    fn write_null(&mut self) -> io::Result<()> {
        self.before_value()?;
        self.formatter.write_null(&mut self.writer)?;
        self.after_value()
    }

    fn write_bool(&mut self, value: bool) -> io::Result<()> {
        self.before_value()?;
        self.formatter.write_bool(&mut self.writer, value)?;
        self.after_value()
    }

    fn write_str(&mut self, value: &str) -> io::Result<()> {
        self.before_value()?;
        self.write_quoted(value)?;
        self.after_value()
    }

    fn write_i64(&mut self, value: i64) -> io::Result<()> {
        self.before_value()?;
        self.formatter.write_i64(&mut self.writer, value)?;
        self.after_value()
    }

    fn write_f64(&mut self, value: f64) -> io::Result<()> {
        if !value.is_finite() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "non-finite float has no JSON form",
            ));
        }
        self.before_value()?;
        self.formatter.write_f64(&mut self.writer, value)?;
        self.after_value()
    }

    fn begin_object(&mut self) -> io::Result<()> {
        self.before_value()?;
        self.formatter.begin_object(&mut self.writer)?;
        self.frames.push(Frame::Object { first: true });
        Ok(())
    }

    fn write_key(&mut self, key: &str) -> io::Result<()> {
        let Some(Frame::Object { first }) = self.frames.last_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "property name outside of an object",
            ));
        };
        let was_first = *first;
        *first = false;
        self.formatter.begin_object_key(&mut self.writer, was_first)?;
        self.write_quoted(key)?;
        self.formatter.end_object_key(&mut self.writer)?;
        self.formatter.begin_object_value(&mut self.writer)
    }

    fn end_object(&mut self) -> io::Result<()> {
        match self.frames.pop() {
            Some(Frame::Object { .. }) => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "end of object without matching start",
                ));
            }
        }
        self.formatter.end_object(&mut self.writer)?;
        self.after_value()
    }

    fn begin_array(&mut self) -> io::Result<()> {
        self.before_value()?;
        self.formatter.begin_array(&mut self.writer)?;
        self.frames.push(Frame::Array { first: true });
        Ok(())
    }

    fn end_array(&mut self) -> io::Result<()> {
        match self.frames.pop() {
            Some(Frame::Array { .. }) => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "end of array without matching start",
                ));
            }
        }
        self.formatter.end_array(&mut self.writer)?;
        self.after_value()
    }
}

enum Pending {
    Array(Vec<Value>),
    Object(Map<String, Value>, Option<String>),
}

/// Builds a `serde_json::Value` from sink events.
#[derive(Default)]
pub struct ValueBuilder {
    stack: Vec<Pending>,
    root: Option<Value>,
}

impl ValueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finished value, or `None` when nothing complete has been written.
    pub fn finish(self) -> Option<Value> {
        if self.stack.is_empty() { self.root } else { None }
    }

    fn push(&mut self, value: Value) -> io::Result<()> {
        match self.stack.last_mut() {
            None if self.root.is_none() => {
                self.root = Some(value);
                Ok(())
            }
            None => Err(invalid_input("more than one root value")),
            Some(Pending::Array(items)) => {
                items.push(value);
                Ok(())
            }
            Some(Pending::Object(map, key)) => {
                let key = key
                    .take()
                    .ok_or_else(|| invalid_input("object value without a property name"))?;
                map.insert(key, value);
                Ok(())
            }
        }
    }
}

fn invalid_input(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

impl JsonSink for ValueBuilder {
    fn write_null(&mut self) -> io::Result<()> {
        self.push(Value::Null)
    }

    fn write_bool(&mut self, value: bool) -> io::Result<()> {
        self.push(Value::Bool(value))
    }

    fn write_str(&mut self, value: &str) -> io::Result<()> {
        self.push(Value::String(value.to_string()))
    }

    fn write_i64(&mut self, value: i64) -> io::Result<()> {
        self.push(Value::from(value))
    }

    fn write_f64(&mut self, value: f64) -> io::Result<()> {
        let number = serde_json::Number::from_f64(value).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "non-finite float has no JSON form",
            )
        })?;
        self.push(Value::Number(number))
    }

    fn begin_object(&mut self) -> io::Result<()> {
        self.stack.push(Pending::Object(Map::new(), None));
        Ok(())
    }

    fn write_key(&mut self, key: &str) -> io::Result<()> {
        match self.stack.last_mut() {
            Some(Pending::Object(_, pending)) => {
                *pending = Some(key.to_string());
                Ok(())
            }
            _ => Err(invalid_input("property name outside of an object")),
        }
    }

    fn end_object(&mut self) -> io::Result<()> {
        match self.stack.pop() {
            Some(Pending::Object(map, _)) => self.push(Value::Object(map)),
            _ => Err(invalid_input("end of object without matching start")),
        }
    }

    fn begin_array(&mut self) -> io::Result<()> {
        self.stack.push(Pending::Array(Vec::new()));
        Ok(())
    }

    fn end_array(&mut self) -> io::Result<()> {
        match self.stack.pop() {
            Some(Pending::Array(items)) => self.push(Value::Array(items)),
            _ => Err(invalid_input("end of array without matching start")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonSink, JsonWriter, ValueBuilder};
    use serde_json::json;
    use std::io;

    fn emit_sample(sink: &mut impl JsonSink) -> io::Result<()> {
        sink.begin_object()?;
        sink.write_key("name")?;
        sink.write_str("q\"1")?;
        sink.write_key("args")?;
        sink.begin_array()?;
        sink.write_i64(10)?;
        sink.write_f64(2.5)?;
        sink.write_bool(false)?;
        sink.write_null()?;
        sink.end_array()?;
        sink.write_key("empty")?;
        sink.begin_object()?;
        sink.end_object()?;
        sink.end_object()
    }

    #[test]
    fn compact_writer_renders_events() {
        let mut writer = JsonWriter::new(Vec::new());
        emit_sample(&mut writer).expect("emit");
        let text = String::from_utf8(writer.into_inner()).expect("utf8");
        assert_eq!(
            text,
            r#"{"name":"q\"1","args":[10,2.5,false,null],"empty":{}}"#
        );
    }

    #[test]
    fn pretty_writer_matches_serde_json_pretty() {
        let mut writer = JsonWriter::pretty(Vec::new());
        emit_sample(&mut writer).expect("emit");
        let text = String::from_utf8(writer.into_inner()).expect("utf8");
        let expected = serde_json::to_string_pretty(
            &json!({"name": "q\"1", "args": [10, 2.5, false, null], "empty": {}}),
        )
        .expect("pretty");
        assert_eq!(text, expected);
    }

    #[test]
    fn writer_rejects_key_outside_object() {
        let mut writer = JsonWriter::new(Vec::new());
        writer.begin_array().expect("begin");
        let err = writer.write_key("x").expect_err("key in array");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn writer_rejects_unbalanced_end() {
        let mut writer = JsonWriter::new(Vec::new());
        writer.begin_object().expect("begin");
        let err = writer.end_array().expect_err("mismatch");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn value_builder_assembles_same_document() {
        let mut builder = ValueBuilder::new();
        emit_sample(&mut builder).expect("emit");
        assert_eq!(
            builder.finish(),
            Some(json!({"name": "q\"1", "args": [10, 2.5, false, null], "empty": {}}))
        );
    }

    #[test]
    fn value_builder_without_root_finishes_empty() {
        let mut builder = ValueBuilder::new();
        builder.begin_array().expect("begin");
        assert_eq!(builder.finish(), None);
    }
}
