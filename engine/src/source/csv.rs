//! Delimited-text source with encoding and delimiter auto-detection.
//!
//! Every cell is delivered as a string; typing is the projector's job.

use encoding_rs::{Encoding, UTF_8};
use serde_json::{Map, Value as JsonValue};
use std::path::Path;

use super::SourceRows;
use crate::error::{SourceError, SourceResult};

/// Candidate delimiters, in tie-break order.
const DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _confidence, _language) = chardet::detect(bytes);
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes with the named encoding, falling back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let encoding = Encoding::for_label(encoding.as_bytes()).unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// The candidate that occurs most often in the header line; `,` when none occur.
pub fn detect_delimiter(content: &str) -> char {
    let header = content.lines().next().unwrap_or("");
    let mut best = (DELIMITERS[0], 0);
    for candidate in DELIMITERS {
        let count = header.matches(candidate).count();
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

/// Parse decoded CSV text into records keyed by the trimmed header names.
///
/// Short rows are padded with empty strings; extra cells are ignored. The header
/// names are returned even when no data rows follow.
pub fn parse_records(content: &str, delimiter: char) -> SourceResult<SourceRows> {
    let delimiter = u8::try_from(delimiter).map_err(|_| SourceError::Parse {
        line: 1,
        message: format!("delimiter {delimiter:?} is not a single-byte character"),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| parse_error(1, e))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(SourceError::Parse {
            line: 1,
            message: "no header row".into(),
        });
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| parse_error(index + 2, e))?;
        let record: Map<String, JsonValue> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = row.get(i).unwrap_or("");
                (header.clone(), JsonValue::String(cell.to_string()))
            })
            .collect();
        records.push(record);
    }
    Ok(SourceRows {
        headers,
        rows: records,
    })
}

/// Read a CSV file, detecting its encoding and (unless given) its delimiter.
pub fn read_csv(path: &Path, delimiter: Option<char>) -> SourceResult<SourceRows> {
    let bytes = std::fs::read(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let encoding = detect_encoding(&bytes);
    let content = decode_content(&bytes, &encoding);
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&content));
    parse_records(&content, delimiter)
}

fn parse_error(line: usize, error: csv::Error) -> SourceError {
    let line = error
        .position()
        .map_or(line, |p| usize::try_from(p.line()).unwrap_or(line));
    SourceError::Parse {
        line,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_semicolons() {
        let rows = parse_records("name;age\nAlice;30\nBob;25", ';').unwrap().rows;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Alice");
        assert_eq!(rows[1]["age"], "25");
    }

    #[test]
    fn test_quoted_cells_keep_delimiters() {
        let rows = parse_records("id,note\n1,\"a, b\"", ',').unwrap().rows;
        assert_eq!(rows[0]["note"], "a, b");
    }

    #[test]
    fn test_short_rows_padded_extra_cells_ignored() {
        let rows = parse_records("a,b,c\n1\n1,2,3,4", ',').unwrap().rows;

        assert_eq!(rows[0]["b"], "");
        assert_eq!(rows[0]["c"], "");
        assert_eq!(rows[1].len(), 3);
    }

    #[test]
    fn test_header_order_preserved() {
        let rows = parse_records("z,a,m\n1,2,3", ',').unwrap().rows;
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_header_only_keeps_columns() {
        let parsed = parse_records("a,b\n", ',').unwrap();

        assert_eq!(parsed.headers, vec!["a", "b"]);
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }

    #[test]
    fn test_read_csv_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("events.csv");
        std::fs::write(&path, "event_id|amount\nE1|10.5\nE2|\n").unwrap();

        let rows = read_csv(&path, None).unwrap().rows;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["amount"], "10.5");
        assert_eq!(rows[1]["amount"], "");
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_csv(Path::new("/no/such/file.csv"), None).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
