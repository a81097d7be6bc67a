//! Column Projector
//!
//! Turns raw source rows into the working [`Dataset`]: configured columns are
//! located (case-insensitively), renamed, coerced to their declared type, and JSON
//! columns are flattened into one column per key path.
//!
//! ```json
//! { "name": "customer_data", "type": "json", "output_name": "customer",
//!   "keys": ["name", { "path": "address.city", "output_name": "city" }] }
//! ```
//!
//! produces `customer_name` and `city`, and drops `customer_data`.

pub mod coerce;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::ProjectionResult;
use crate::logs::{log_info, log_warning};
use crate::models::{Dataset, Value};

use coerce::{decode_json, to_float, to_int, to_string, to_timestamp, walk_path};

/// Declared type of a source column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Numeric,
    Date,
    Json,
}

/// Storage of a numeric column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericKind {
    Int,
    #[default]
    Float,
}

/// Type of a value extracted from a JSON key path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    String,
    Numeric,
    Date,
}

/// One key path to extract from a JSON column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyConfig {
    /// Bare dot-path, e.g. `"address.city"`
    Path(String),
    /// Path with optional output name and type
    Detailed {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_name: Option<String>,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        value_type: Option<KeyType>,
    },
}

impl KeyConfig {
    pub fn path(&self) -> &str {
        match self {
            KeyConfig::Path(path) => path,
            KeyConfig::Detailed { path, .. } => path,
        }
    }

    /// Explicit output name, if any.
    pub fn output_name(&self) -> Option<&str> {
        match self {
            KeyConfig::Path(_) => None,
            KeyConfig::Detailed { output_name, .. } => output_name.as_deref(),
        }
    }

    pub fn value_type(&self) -> Option<KeyType> {
        match self {
            KeyConfig::Path(_) => None,
            KeyConfig::Detailed { value_type, .. } => *value_type,
        }
    }

    /// Name of the column this key produces under a JSON column named `prefix`.
    pub fn column_name(&self, prefix: &str) -> String {
        match self.output_name() {
            Some(name) => name.to_string(),
            None => format!("{}_{}", prefix, self.path().replace('.', "_")),
        }
    }

    fn coerce(&self, value: Value) -> Value {
        match self.value_type() {
            None => value,
            Some(KeyType::String) => to_string(&value),
            Some(KeyType::Numeric) => to_float(&value),
            Some(KeyType::Date) => to_timestamp(&value),
        }
    }
}

/// Configuration of one projected column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name in the source rows
    pub name: String,

    #[serde(rename = "type", default)]
    pub column_type: ColumnType,

    /// Name in the working dataset (defaults to `name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,

    /// Only meaningful for numeric columns
    #[serde(default)]
    pub data_type: NumericKind,

    /// Only meaningful for json columns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<KeyConfig>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            output_name: None,
            data_type: NumericKind::default(),
            keys: Vec::new(),
        }
    }

    pub fn with_output_name(mut self, output_name: impl Into<String>) -> Self {
        self.output_name = Some(output_name.into());
        self
    }

    pub fn with_data_type(mut self, data_type: NumericKind) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_key(mut self, key: KeyConfig) -> Self {
        self.keys.push(key);
        self
    }

    /// Effective output name.
    pub fn output_name(&self) -> &str {
        self.output_name.as_deref().unwrap_or(&self.name)
    }

    fn coerce(&self, value: &Value) -> Value {
        match (self.column_type, self.data_type) {
            (ColumnType::Numeric, NumericKind::Int) => to_int(value),
            (ColumnType::Numeric, NumericKind::Float) => to_float(value),
            (ColumnType::Date, _) => to_timestamp(value),
            (ColumnType::String, _) | (ColumnType::Json, _) => value.clone(),
        }
    }
}

/// Build the working dataset from the untyped source dataset and column settings.
///
/// Columns not named by any `ColumnSpec` are carried through unchanged.
pub fn project(mut dataset: Dataset, specs: &[ColumnSpec]) -> ProjectionResult<Dataset> {
    for spec in specs {
        let Some(source) = dataset.find_case_insensitive(&spec.name).map(str::to_string) else {
            log_warning(format!(
                "Column '{}' not found. Available columns: {:?}",
                spec.name,
                dataset.column_names()
            ));
            continue;
        };

        match spec.column_type {
            ColumnType::Json if !spec.keys.is_empty() => flatten_json(&mut dataset, &source, spec)?,
            ColumnType::Json => {
                let values = dataset
                    .require(&source)?
                    .values
                    .iter()
                    .map(|v| decode_json(v).map_or(Value::Null, |doc| Value::from_json(&doc)))
                    .collect();
                place(&mut dataset, &source, spec.output_name(), values)?;
            }
            _ => {
                let values = dataset.require(&source)?.values.iter().map(|v| spec.coerce(v)).collect();
                place(&mut dataset, &source, spec.output_name(), values)?;
            }
        }
    }

    log_info(format!(
        "Projected {} rows into {} columns",
        dataset.row_count(),
        dataset.column_count()
    ));
    Ok(dataset)
}

/// Write `values` under `output`, dropping `source` when the names differ.
fn place(dataset: &mut Dataset, source: &str, output: &str, values: Vec<Value>) -> ProjectionResult<()> {
    if output != source {
        dataset.drop_column(source);
    }
    dataset.set_column(output, values)?;
    Ok(())
}

fn flatten_json(dataset: &mut Dataset, source: &str, spec: &ColumnSpec) -> ProjectionResult<()> {
    let documents: Vec<Option<JsonValue>> = dataset.require(source)?.values.iter().map(decode_json).collect();

    let mut produced = Vec::with_capacity(spec.keys.len());
    for key in &spec.keys {
        let values = documents
            .iter()
            .map(|doc| {
                doc.as_ref()
                    .and_then(|d| walk_path(d, key.path()))
                    .map_or(Value::Null, |v| key.coerce(Value::from_json(v)))
            })
            .collect();
        let name = key.column_name(spec.output_name());
        dataset.set_column(name.as_str(), values)?;
        produced.push(name);
    }

    if !produced.iter().any(|name| name == source) {
        dataset.drop_column(source);
    }
    Ok(())
}
