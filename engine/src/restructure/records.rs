//! Dataset to JSON record conversion.

use serde_json::{Map, Value as JsonValue};

use super::JsonStructure;
use crate::error::{RestructureError, RestructureResult};
use crate::models::{Dataset, Value};

/// JSON form of one cell; durations are rejected.
pub fn cell_to_json(column: &str, value: &Value) -> RestructureResult<JsonValue> {
    value.to_json().ok_or_else(|| RestructureError::Unserializable {
        column: column.to_string(),
        kind: value.type_name(),
    })
}

/// One flat record per row, fields in column order.
pub fn to_records(dataset: &Dataset) -> RestructureResult<Vec<JsonValue>> {
    (0..dataset.row_count())
        .map(|row| {
            let mut record = Map::with_capacity(dataset.column_count());
            for column in dataset.columns() {
                record.insert(column.name.clone(), cell_to_json(&column.name, &column.values[row])?);
            }
            Ok(JsonValue::Object(record))
        })
        .collect()
}

/// One nested record per row.
///
/// Fields the dataset does not have are omitted, as is a group left empty.
pub fn to_tree(dataset: &Dataset, structure: &JsonStructure) -> RestructureResult<Vec<JsonValue>> {
    (0..dataset.row_count())
        .map(|row| {
            let mut record = Map::new();
            copy_fields(dataset, row, &structure.root, &mut record)?;

            for (group, fields) in &structure.nested {
                let mut nested = Map::new();
                copy_fields(dataset, row, fields, &mut nested)?;
                if !nested.is_empty() {
                    record.insert(group.clone(), JsonValue::Object(nested));
                }
            }
            Ok(JsonValue::Object(record))
        })
        .collect()
}

fn copy_fields(
    dataset: &Dataset,
    row: usize,
    fields: &[String],
    target: &mut Map<String, JsonValue>,
) -> RestructureResult<()> {
    for field in fields {
        if let Some(value) = dataset.get(field, row) {
            target.insert(field.clone(), cell_to_json(field, value)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Column;
    use chrono::{NaiveDate, TimeDelta};
    use serde_json::json;

    fn sample() -> Dataset {
        Dataset::from_columns(vec![
            Column::new("id", vec![Value::Int(1), Value::Int(2)]),
            Column::new("city", vec![Value::from("Pune"), Value::Null]),
            Column::new("ratio", vec![Value::Float(f64::INFINITY), Value::Float(0.5)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_flat_records_follow_column_order() {
        let records = to_records(&sample()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0], json!({"id": 1, "city": "Pune", "ratio": null}));
        let keys: Vec<&String> = records[1].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["id", "city", "ratio"]);
    }

    #[test]
    fn test_tree_omits_absent_fields_and_empty_groups() {
        let structure = JsonStructure {
            root: vec!["id".into(), "missing".into()],
            nested: vec![
                ("location".into(), vec!["city".into()]),
                ("ghost".into(), vec!["nope".into()]),
            ],
        };

        let records = to_tree(&sample(), &structure).unwrap();

        assert_eq!(records[0], json!({"id": 1, "location": {"city": "Pune"}}));
        assert_eq!(records[1], json!({"id": 2, "location": {"city": null}}));
    }

    #[test]
    fn test_timestamps_become_iso_text() {
        let t = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap();
        let ds = Dataset::from_columns(vec![Column::new("at", vec![Value::Timestamp(t)])]).unwrap();

        assert_eq!(to_records(&ds).unwrap()[0], json!({"at": "2024-01-02T03:04:05"}));
    }

    #[test]
    fn test_duration_is_unserializable() {
        let ds = Dataset::from_columns(vec![Column::new("took", vec![Value::Duration(TimeDelta::seconds(5))])])
            .unwrap();

        let err = to_records(&ds).unwrap_err();

        assert!(matches!(err, RestructureError::Unserializable { kind: "duration", .. }));
        assert!(err.to_string().contains("'took'"));
    }
}
