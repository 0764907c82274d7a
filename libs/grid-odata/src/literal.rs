//! `OData` literal encoding.
//!
//! String literals are single-quoted with embedded quotes doubled.
//! Date-like strings become unquoted `OData` datetime literals; when a value
//! cannot be parsed as a date the caller gets [`DateLiteral::PlainString`]
//! back instead of an error, so the query can still be built.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const DATE_FORMAT: &str = "%Y-%m-%d";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Result of encoding a date operand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DateLiteral {
    /// Parsed successfully; holds the unquoted datetime (or date) literal.
    DateTime(String),
    /// Parsing failed; holds the quoted string literal used instead.
    PlainString(String),
}

impl DateLiteral {
    /// The literal text to splice into the query.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            DateLiteral::DateTime(s) | DateLiteral::PlainString(s) => s,
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, DateLiteral::PlainString(_))
    }
}

/// Quote a string literal, doubling embedded single quotes.
#[must_use]
pub fn encode(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Convert a date-like string into an `OData` datetime literal (UTC).
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DD hh:mm:ss` (with `T` or space,
/// optional fraction) and bare `YYYY-MM-DD`. Naive values are taken as UTC.
#[must_use]
pub fn to_date_time(value: &str) -> Option<String> {
    parse_utc(value).map(|dt| dt.format(DATETIME_FORMAT).to_string())
}

/// Convert a date-like string into an `OData` date literal (`YYYY-MM-DD`).
#[must_use]
pub fn to_date(value: &str) -> Option<String> {
    parse_utc(value).map(|dt| dt.format(DATE_FORMAT).to_string())
}

fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    Some(naive.and_utc())
}

/// Encode a date operand, falling back to a quoted string literal.
#[must_use]
pub fn encode_date(value: &str) -> DateLiteral {
    encode_date_as(value, to_date_time)
}

/// Encode a date operand as a date-only literal, for comparisons against
/// [`crate::operators::trunc`]. Falls back like [`encode_date`].
#[must_use]
pub fn encode_date_only(value: &str) -> DateLiteral {
    encode_date_as(value, to_date)
}

fn encode_date_as(value: &str, convert: fn(&str) -> Option<String>) -> DateLiteral {
    if let Some(dt) = convert(value) {
        DateLiteral::DateTime(dt)
    } else {
        tracing::warn!(
            target: "grid_odata::literal",
            value,
            "date operand is not parseable, using it as a string literal"
        );
        DateLiteral::PlainString(encode(value))
    }
}

/// Whether a JSON value must be quoted in a query.
#[must_use]
pub fn is_str_val(value: &Value) -> bool {
    matches!(value, Value::String(_))
}

/// Encode a numeric operand. Numeric strings are emitted bare, anything
/// else that is a string gets quoted.
#[must_use]
pub fn encode_number(value: &Value) -> String {
    match value {
        Value::String(s) if s.trim().parse::<f64>().is_ok_and(f64::is_finite) => {
            s.trim().to_owned()
        }
        other => encode_value(other),
    }
}

/// Encode an arbitrary JSON scalar as a query literal.
#[must_use]
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => encode(s),
        other => encode(&other.to_string()),
    }
}

/// Render a JSON scalar as plain display text (no quoting).
#[must_use]
pub fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
