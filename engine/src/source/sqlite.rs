//! SQLite database source.
//!
//! The database is opened read-only and the generated SELECT is run as-is. Cells keep
//! their storage class: integers and reals become numbers, text stays text and blobs
//! are decoded as lossy UTF-8.

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::{Map, Number, Value as JsonValue};
use std::path::Path;

use super::SourceRows;
use crate::error::{SourceError, SourceResult};

/// Run `query` against the database file at `path`.
pub fn read_sqlite(path: &Path, query: &str) -> SourceResult<SourceRows> {
    if !path.is_file() {
        return Err(SourceError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "database file not found"),
        });
    }
    let database = |source| SourceError::Database {
        path: path.to_path_buf(),
        source,
    };

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(database)?;
    let mut stmt = conn.prepare(query).map_err(database)?;
    let headers: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut records = Vec::new();
    let mut rows = stmt.query([]).map_err(database)?;
    while let Some(row) = rows.next().map_err(database)? {
        let mut record = Map::with_capacity(headers.len());
        for (index, name) in headers.iter().enumerate() {
            let cell = row.get_ref(index).map_err(database)?;
            record.insert(name.clone(), cell_to_json(cell));
        }
        records.push(record);
    }

    Ok(SourceRows {
        headers,
        rows: records,
    })
}

fn cell_to_json(cell: ValueRef<'_>) -> JsonValue {
    match cell {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(n) => JsonValue::from(n),
        ValueRef::Real(f) => Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number),
        ValueRef::Text(t) | ValueRef::Blob(t) => JsonValue::String(String::from_utf8_lossy(t).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bill_events(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("billing.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE BillEvent (event_id TEXT, amount REAL, qty INTEGER, Description TEXT);
            INSERT INTO BillEvent VALUES ('E1', 120.5, 2, '{"currency": "INR", "amount": 120.5}');
            INSERT INTO BillEvent VALUES ('E2', NULL, 1, '{"currency": "USD", "amount": 80}');
            INSERT INTO BillEvent VALUES ('E3', 10, 7, '{"currency": "INR", "amount": 10}');
            "#,
        )
        .unwrap();
        path
    }

    #[test]
    fn test_storage_classes_map_to_json() {
        let dir = TempDir::new().unwrap();
        let path = bill_events(&dir);

        let table = read_sqlite(&path, "SELECT event_id, amount, qty FROM BillEvent").unwrap();

        assert_eq!(table.headers, vec!["event_id", "amount", "qty"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0]["event_id"], "E1");
        assert_eq!(table.rows[0]["amount"], 120.5);
        assert_eq!(table.rows[0]["qty"], 2);
        assert!(table.rows[1]["amount"].is_null());
    }

    #[test]
    fn test_empty_result_keeps_headers() {
        let dir = TempDir::new().unwrap();
        let path = bill_events(&dir);

        let table = read_sqlite(&path, "SELECT event_id, qty FROM BillEvent WHERE qty > 100").unwrap();

        assert_eq!(table.headers, vec!["event_id", "qty"]);
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_bad_query_names_database() {
        let dir = TempDir::new().unwrap();
        let path = bill_events(&dir);

        let err = read_sqlite(&path, "SELECT nope FROM Missing").unwrap_err();

        assert!(matches!(err, SourceError::Database { .. }));
        assert!(err.to_string().contains("billing.db"));
    }

    #[test]
    fn test_missing_database_file() {
        let err = read_sqlite(Path::new("/no/such/billing.db"), "SELECT 1").unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
