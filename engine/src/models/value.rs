//! Cell values of the working dataset.

use chrono::{NaiveDateTime, TimeDelta};
use serde_json::{Number, Value as JsonValue};

/// Textual form used for timestamps in every output format (ISO-8601).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A single typed cell.
///
/// `Null` is the "missing" marker produced by failed coercions and unresolvable JSON
/// paths. A `Float` NaN (e.g. `0 / 0`) is also treated as missing by aggregates.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Calendar date-time, normalised to UTC.
    Timestamp(NaiveDateTime),
    /// Difference between two timestamps.
    Duration(TimeDelta),
    /// A decoded JSON array or object.
    Json(JsonValue),
}

impl Value {
    /// Convert a raw JSON value as delivered by a source.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(_) | JsonValue::Object(_) => Value::Json(value.clone()),
        }
    }

    /// JSON representation, or `None` for values JSON cannot express (durations).
    ///
    /// Non-finite floats become `null`.
    pub fn to_json(&self) -> Option<JsonValue> {
        match self {
            Value::Null => Some(JsonValue::Null),
            Value::Bool(b) => Some(JsonValue::Bool(*b)),
            Value::Int(i) => Some(JsonValue::Number((*i).into())),
            Value::Float(f) => Some(Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number)),
            Value::String(s) => Some(JsonValue::String(s.clone())),
            Value::Timestamp(t) => Some(JsonValue::String(format_timestamp(t))),
            Value::Duration(_) => None,
            Value::Json(j) => Some(j.clone()),
        }
    }

    /// Text used for flat tabular encodings. Missing values are empty.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) if f.is_nan() => String::new(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Timestamp(t) => format_timestamp(t),
            Value::Duration(d) => d.to_string(),
            Value::Json(j) => j.to_string(),
        }
    }

    /// Missing marker or NaN.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of Int, Float and Bool.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::Duration(_) => "duration",
            Value::Json(_) => "json",
        }
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
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(t: NaiveDateTime) -> Self {
        Value::Timestamp(t)
    }
}

/// ISO-8601 text of a timestamp; fractional seconds only when non-zero.
pub fn format_timestamp(t: &NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Seconds in a duration, with sub-second precision when it fits.
pub fn duration_seconds(d: &TimeDelta) -> f64 {
    d.num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or_else(|| d.num_seconds() as f64)
}
