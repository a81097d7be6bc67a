//! Coerce-or-null conversions used by the column projector.
//!
//! None of these functions fail: a value that cannot be converted becomes
//! [`Value::Null`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

use crate::models::Value;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATETIME_TZ_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Integer coercion. Non-integral numbers become `Null`.
pub fn to_int(value: &Value) -> Value {
    match value {
        Value::Int(i) => Value::Int(*i),
        Value::Bool(b) => Value::Int(i64::from(*b)),
        Value::Float(f) => float_to_int(*f),
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => s.parse::<f64>().map(float_to_int).unwrap_or(Value::Null),
            }
        }
        _ => Value::Null,
    }
}

/// Floating-point coercion.
pub fn to_float(value: &Value) -> Value {
    match value {
        Value::Int(_) | Value::Float(_) | Value::Bool(_) => {
            value.as_f64().map(Value::Float).unwrap_or(Value::Null)
        }
        Value::String(s) => s.trim().parse::<f64>().map(Value::Float).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Timestamp coercion.
pub fn to_timestamp(value: &Value) -> Value {
    match value {
        Value::Timestamp(t) => Value::Timestamp(*t),
        Value::String(s) => parse_timestamp(s).map(Value::Timestamp).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// String coercion; missing stays missing.
pub fn to_string(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_text()),
    }
}

/// Parse a date or date-time. Offsets are normalised to UTC.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_TZ_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.naive_utc());
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Decode a cell as a JSON document. Empty or malformed input is `None`.
pub fn decode_json(value: &Value) -> Option<JsonValue> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => serde_json::from_str(s).ok(),
        Value::Json(j) => Some(j.clone()),
        other => other.to_json(),
    }
}

/// Walk a dot-separated path through nested objects.
///
/// Any segment that is absent, or whose container is not an object, makes the whole
/// path unresolvable.
pub fn walk_path<'a>(document: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.')
        .try_fold(document, |current, key| current.as_object()?.get(key))
}

fn float_to_int(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Value::Int(f as i64)
    } else {
        Value::Null
    }
}
