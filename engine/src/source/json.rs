//! JSON array and NDJSON sources.

use serde_json::{Map, Value as JsonValue};
use std::path::Path;

use crate::error::{SourceError, SourceResult};

/// Read a JSON array of objects, or one object per line for `.ndjson` files.
pub fn read_json(path: &Path) -> SourceResult<Vec<Map<String, JsonValue>>> {
    let content = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_ndjson = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ndjson"));

    if is_ndjson {
        parse_ndjson(&content)
    } else {
        parse_array(&content)
    }
}

/// Parse a top-level array whose items are all objects.
pub fn parse_array(content: &str) -> SourceResult<Vec<Map<String, JsonValue>>> {
    let value: JsonValue = serde_json::from_str(content).map_err(|e| SourceError::Parse {
        line: e.line(),
        message: e.to_string(),
    })?;

    let JsonValue::Array(items) = value else {
        return Err(SourceError::Parse {
            line: 1,
            message: "expected a JSON array of objects".into(),
        });
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            JsonValue::Object(map) => Ok(map),
            _ => Err(SourceError::NotAnObject(i)),
        })
        .collect()
}

/// Parse newline-delimited objects. Blank lines are skipped.
pub fn parse_ndjson(content: &str) -> SourceResult<Vec<Map<String, JsonValue>>> {
    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: JsonValue = serde_json::from_str(line).map_err(|e| SourceError::Parse {
            line: index + 1,
            message: e.to_string(),
        })?;
        match value {
            JsonValue::Object(map) => records.push(map),
            _ => return Err(SourceError::NotAnObject(records.len())),
        }
    }
    Ok(records)
}
