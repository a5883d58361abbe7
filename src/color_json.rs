//! Purpose: Render pretty JSON for a `DynamicValue` with optional ANSI colorization.
//! Exports: colorize_json.
//! Role: Small, pure formatter used by CLI emission paths.
//! Invariants: When color is disabled, output equals `codec::to_string_pretty`.
//! Invariants: ANSI escapes appear only when explicitly enabled.
#![allow(clippy::result_large_err)]
use brokeradm::api::{DynamicMap, DynamicValue, Error, ErrorKind};
use brokeradm::core::timestamp::format_timestamp;

const INDENT: &str = "  ";

// Conservative 8/16-color palette for broad terminal compatibility.
const COLOR_KEY: &str = "36";
const COLOR_STRING: &str = "32";
const COLOR_TIMESTAMP: &str = "34";
const COLOR_NUMBER: &str = "33";
const COLOR_BOOL: &str = "35";
const COLOR_NULL: &str = "39";
const COLOR_PUNCT: &str = "39";

pub fn colorize_json(value: &DynamicValue, use_color: bool) -> Result<String, Error> {
    let mut out = String::new();
    write_value(value, 0, use_color, &mut out)?;
    Ok(out)
}

fn write_value(
    value: &DynamicValue,
    indent: usize,
    use_color: bool,
    out: &mut String,
) -> Result<(), Error> {
    match value {
        DynamicValue::Null => push_colored("null", COLOR_NULL, use_color, out),
        DynamicValue::Bool(val) => {
            let text = if *val { "true" } else { "false" };
            push_colored(text, COLOR_BOOL, use_color, out);
        }
        DynamicValue::Integer(num) => push_colored(&num.to_string(), COLOR_NUMBER, use_color, out),
        DynamicValue::Float(num) => {
            let number = serde_json::Number::from_f64(*num).ok_or_else(|| {
                Error::new(ErrorKind::Unrepresentable)
                    .with_message(format!("float {num} has no JSON form"))
            })?;
            push_colored(&number.to_string(), COLOR_NUMBER, use_color, out);
        }
        DynamicValue::String(text) => {
            push_colored(&quoted(text), COLOR_STRING, use_color, out);
        }
        DynamicValue::Timestamp(ts) => {
            let text = format_timestamp(ts).map_err(|err| {
                Error::new(ErrorKind::Unrepresentable)
                    .with_message("timestamp has no RFC 3339 form")
                    .with_source(err)
            })?;
            push_colored(&quoted(&text), COLOR_TIMESTAMP, use_color, out);
        }
        DynamicValue::Array(items) => write_array(items, indent, use_color, out)?,
        DynamicValue::Object(map) => write_object(map, indent, use_color, out)?,
    }
    Ok(())
}

fn write_array(
    items: &[DynamicValue],
    indent: usize,
    use_color: bool,
    out: &mut String,
) -> Result<(), Error> {
    if items.is_empty() {
        push_colored("[]", COLOR_PUNCT, use_color, out);
        return Ok(());
    }
    push_colored("[", COLOR_PUNCT, use_color, out);
    out.push('\n');
    for (idx, item) in items.iter().enumerate() {
        push_indent(indent + 1, out);
        write_value(item, indent + 1, use_color, out)?;
        if idx + 1 < items.len() {
            push_colored(",", COLOR_PUNCT, use_color, out);
        }
        out.push('\n');
    }
    push_indent(indent, out);
    push_colored("]", COLOR_PUNCT, use_color, out);
    Ok(())
}

fn write_object(
    map: &DynamicMap,
    indent: usize,
    use_color: bool,
    out: &mut String,
) -> Result<(), Error> {
    if map.is_empty() {
        push_colored("{}", COLOR_PUNCT, use_color, out);
        return Ok(());
    }
    push_colored("{", COLOR_PUNCT, use_color, out);
    out.push('\n');
    let len = map.len();
    for (idx, (key, value)) in map.iter().enumerate() {
        push_indent(indent + 1, out);
        push_colored(&quoted(key), COLOR_KEY, use_color, out);
        push_colored(":", COLOR_PUNCT, use_color, out);
        out.push(' ');
        write_value(value, indent + 1, use_color, out)?;
        if idx + 1 < len {
            push_colored(",", COLOR_PUNCT, use_color, out);
        }
        out.push('\n');
    }
    push_indent(indent, out);
    push_colored("}", COLOR_PUNCT, use_color, out);
    Ok(())
}

fn quoted(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

fn push_indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}

fn push_colored(text: &str, color: &str, use_color: bool, out: &mut String) {
    if !use_color {
        out.push_str(text);
        return;
    }
    out.push_str("\u{1b}[");
    out.push_str(color);
    out.push('m');
    out.push_str(text);
    out.push_str("\u{1b}[0m");
}

#[cfg(test)]
mod tests {
    use super::colorize_json;
    use brokeradm::api::{DynamicValue, ErrorKind, codec};

    #[test]
    fn colorize_json_matches_pretty_when_disabled() {
        let value = codec::from_str(
            r#"{"arr":[1,2.5,true,null],"nested":{"x":"y"},"since":"2023-11-05T10:15:30Z","e":[]}"#,
        )
        .expect("parse");
        let plain = colorize_json(&value, false).expect("render");
        let pretty = codec::to_string_pretty(&value).expect("pretty");
        assert_eq!(plain, pretty);
    }

    #[test]
    fn colorize_json_emits_ansi_when_enabled() {
        let value = codec::from_str(
            r#"{"k":"v","n":1,"b":true,"z":null,"t":"2013-08-05 11:09:48"}"#,
        )
        .expect("parse");
        let colored = colorize_json(&value, true).expect("render");
        assert!(colored.contains("\u{1b}[36m\"k\"\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[32m\"v\"\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[33m1\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[35mtrue\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[39mnull\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[34m\"2013-08-05T11:09:48Z\"\u{1b}[0m"));
    }

    #[test]
    fn colorize_json_rejects_non_finite_float() {
        let err = colorize_json(&DynamicValue::Float(f64::NAN), false).expect_err("nan");
        assert_eq!(err.kind(), ErrorKind::Unrepresentable);
    }
}
