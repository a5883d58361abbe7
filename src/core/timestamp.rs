//! Purpose: Date-time text grammar shared by the read and write paths of the codec.
//! Exports: `parse_timestamp`, `format_timestamp`.
//! Invariants: Writes are always RFC 3339; reads accept RFC 3339 plus the broker's legacy
//! `YYYY-MM-DD HH:MM:SS` form, taken as UTC.
//! Invariants: Nothing looser is promoted. Date-only text such as `2023-11-05` stays a string,
//! so identifiers that merely look like dates keep their type.
//! Invariants: A formatted timestamp parses back to the same instant.

use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

const LEGACY: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Returns `None` for anything that is not a date-time in one of the accepted forms.
pub fn parse_timestamp(text: &str) -> Option<OffsetDateTime> {
    // Cheap reject before invoking the parsers: every accepted form starts with `YYYY-`.
    let bytes = text.as_bytes();
    if bytes.len() < 19 || !bytes[..4].iter().all(u8::is_ascii_digit) || bytes[4] != b'-' {
        return None;
    }
    if let Ok(parsed) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(parsed);
    }
    PrimitiveDateTime::parse(text, LEGACY)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

pub fn format_timestamp(value: &OffsetDateTime) -> Result<String, time::error::Format> {
    value.format(&Rfc3339)
}
