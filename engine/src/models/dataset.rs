//! The in-memory tabular dataset.
//!
//! ```text
//! Dataset
//! ┌──────────┬──────────┬──────────┐
//! │ event_id │ amount   │ currency │   columns: ordered, unique names
//! ├──────────┼──────────┼──────────┤
//! │ "E1001"  │ 120.5    │ "INR"    │   rows: same count in every column
//! │ "E1002"  │ Null     │ "USD"    │
//! └──────────┴──────────┴──────────┘
//! ```

use serde_json::{Map, Value as JsonValue};

use super::value::Value;
use crate::error::{DatasetError, DatasetResult};

/// A named column of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self { name: name.into(), values }
    }
}

/// An ordered set of equally long, uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    /// Create an empty dataset
    pub fn new() -> Self {
        Self { columns: Vec::new() }
    }

    /// Build a dataset from columns, checking name uniqueness and row counts.
    pub fn from_columns(columns: Vec<Column>) -> DatasetResult<Self> {
        let mut dataset = Self::new();
        for column in columns {
            if dataset.contains(&column.name) {
                return Err(DatasetError::DuplicateColumn(column.name));
            }
            dataset.set_column(column.name, column.values)?;
        }
        Ok(dataset)
    }

    /// Build a dataset from mapping records.
    ///
    /// Column order follows first appearance; a key absent from a record is `Null`.
    pub fn from_records(records: &[Map<String, JsonValue>]) -> Self {
        Self::from_rows(&[], records)
    }

    /// Like [`Dataset::from_records`], but `headers` come first and exist even
    /// when there are no records.
    pub fn from_rows(headers: &[String], records: &[Map<String, JsonValue>]) -> Self {
        let mut names: Vec<&String> = Vec::new();
        for name in headers {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        for record in records {
            for key in record.keys() {
                if !names.contains(&key) {
                    names.push(key);
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| Column {
                name: name.clone(),
                values: records
                    .iter()
                    .map(|r| r.get(name).map(Value::from_json).unwrap_or(Value::Null))
                    .collect(),
            })
            .collect();

        Self { columns }
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Like [`Dataset::column`], but a missing column is an error.
    pub fn require(&self, name: &str) -> DatasetResult<&Column> {
        self.column(name)
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
    }

    /// The value at `row` of column `name`.
    pub fn get(&self, name: &str, row: usize) -> Option<&Value> {
        self.column(name).and_then(|c| c.values.get(row))
    }

    /// Actual name of the first column matching `name` case-insensitively.
    pub fn find_case_insensitive(&self, name: &str) -> Option<&str> {
        let wanted = name.to_lowercase();
        self.columns
            .iter()
            .find(|c| c.name.to_lowercase() == wanted)
            .map(|c| c.name.as_str())
    }

    /// Replace a column in place, or append it if the name is new.
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> DatasetResult<()> {
        let name = name.into();
        if !self.columns.is_empty() && values.len() != self.row_count() {
            return Err(DatasetError::LengthMismatch {
                column: name,
                expected: self.row_count(),
                actual: values.len(),
            });
        }

        match self.position(&name) {
            Some(idx) => self.columns[idx].values = values,
            None => self.columns.push(Column { name, values }),
        }
        Ok(())
    }

    /// Remove a column, returning it if it existed.
    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        self.position(name).map(|idx| self.columns.remove(idx))
    }

    /// New dataset with exactly `names`, in that order.
    pub fn select(&self, names: &[String]) -> DatasetResult<Dataset> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            if columns.iter().any(|c: &Column| &c.name == name) {
                return Err(DatasetError::DuplicateColumn(name.clone()));
            }
            columns.push(self.require(name)?.clone());
        }
        Ok(Dataset { columns })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: JsonValue) -> Vec<Map<String, JsonValue>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_headers_survive_without_records() {
        let ds = Dataset::from_rows(&["a".to_string(), "b".to_string()], &[]);

        assert_eq!(ds.column_names(), vec!["a", "b"]);
        assert_eq!(ds.row_count(), 0);
        assert!(ds.require("b").unwrap().values.is_empty());
    }

    #[test]
    fn test_headers_lead_record_keys() {
        let ds = Dataset::from_rows(&["b".to_string()], &records(json!([{"a": 1, "b": 2}])));

        assert_eq!(ds.column_names(), vec!["b", "a"]);
        assert_eq!(ds.get("b", 0), Some(&Value::Int(2)));
    }

    #[test]
    fn test_from_records_preserves_key_order() {
        let ds = Dataset::from_records(&records(json!([
            {"b": 1, "a": "x"},
            {"b": 2, "a": "y", "c": true}
        ])));

        assert_eq!(ds.column_names(), vec!["b", "a", "c"]);
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.get("c", 0), Some(&Value::Null));
        assert_eq!(ds.get("c", 1), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_set_column_replaces_in_place() {
        let mut ds = Dataset::from_records(&records(json!([{"a": 1, "b": 2}])));
        ds.set_column("a", vec![Value::Int(10)]).unwrap();
        ds.set_column("c", vec![Value::Int(3)]).unwrap();

        assert_eq!(ds.column_names(), vec!["a", "b", "c"]);
        assert_eq!(ds.get("a", 0), Some(&Value::Int(10)));
    }

    #[test]
    fn test_set_column_length_mismatch() {
        let mut ds = Dataset::from_records(&records(json!([{"a": 1}, {"a": 2}])));
        let err = ds.set_column("b", vec![Value::Int(1)]).unwrap_err();
        assert_eq!(
            err,
            DatasetError::LengthMismatch { column: "b".into(), expected: 2, actual: 1 }
        );
    }

    #[test]
    fn test_select_orders_and_rejects_missing() {
        let ds = Dataset::from_records(&records(json!([{"a": 1, "b": 2, "c": 3}])));

        let selected = ds.select(&["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(selected.column_names(), vec!["b", "a"]);

        let err = ds.select(&["zzz".to_string()]).unwrap_err();
        assert_eq!(err, DatasetError::MissingColumn("zzz".into()));
    }

    #[test]
    fn test_from_columns_rejects_duplicates() {
        let err = Dataset::from_columns(vec![
            Column::new("a", vec![Value::Int(1)]),
            Column::new("a", vec![Value::Int(2)]),
        ])
        .unwrap_err();
        assert_eq!(err, DatasetError::DuplicateColumn("a".into()));
    }

    #[test]
    fn test_find_case_insensitive() {
        let ds = Dataset::from_records(&records(json!([{"AccountSID": "AC1"}])));
        assert_eq!(ds.find_case_insensitive("accountsid"), Some("AccountSID"));
        assert_eq!(ds.find_case_insensitive("missing"), None);
    }
}
