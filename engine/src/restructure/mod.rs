//! Restructure Engine
//!
//! Projects the working dataset onto the requested columns and shapes it for
//! output:
//!
//! | format      | returned          | written when `output_path` is set |
//! |-------------|-------------------|-----------------------------------|
//! | `dataframe` | dataset           | nothing                           |
//! | `csv`       | dataset           | CSV with header row               |
//! | `excel`     | dataset           | single-sheet `.xlsx`              |
//! | `json`      | records           | indented JSON array               |

pub mod records;
pub mod writers;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use std::path::{Path, PathBuf};

use crate::error::RestructureResult;
use crate::logs::log_info;
use crate::models::{Column, Dataset};

pub use records::{cell_to_json, to_records, to_tree};

/// Output shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Dataframe,
    Json,
    Csv,
    Excel,
}

/// Which columns to keep, optionally renamed.
///
/// Written either as a list (`["b", "a"]`) or as an ordered mapping
/// (`{"old": "new"}`).
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSelection {
    List(Vec<String>),
    Mapping(Vec<(String, String)>),
}

impl ColumnSelection {
    pub fn is_empty(&self) -> bool {
        match self {
            ColumnSelection::List(names) => names.is_empty(),
            ColumnSelection::Mapping(pairs) => pairs.is_empty(),
        }
    }

    /// Build the projected dataset.
    pub fn apply(&self, dataset: &Dataset) -> RestructureResult<Dataset> {
        if self.is_empty() {
            return Ok(dataset.clone());
        }
        match self {
            ColumnSelection::List(names) => Ok(dataset.select(names)?),
            ColumnSelection::Mapping(pairs) => {
                let columns = pairs
                    .iter()
                    .map(|(old, new)| -> RestructureResult<Column> {
                        Ok(Column::new(new.as_str(), dataset.require(old)?.values.clone()))
                    })
                    .collect::<RestructureResult<Vec<_>>>()?;
                Ok(Dataset::from_columns(columns)?)
            }
        }
    }
}

impl<'de> Deserialize<'de> for ColumnSelection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match JsonValue::deserialize(deserializer)? {
            JsonValue::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    JsonValue::String(name) => Ok(name),
                    other => Err(D::Error::custom(format!("column name must be a string, got {other}"))),
                })
                .collect::<Result<Vec<String>, D::Error>>()
                .map(ColumnSelection::List),
            JsonValue::Object(map) => map
                .into_iter()
                .map(|(old, new)| match new {
                    JsonValue::String(new) => Ok((old, new)),
                    _ => Err(D::Error::custom(format!("column mapping for '{old}' must be a string"))),
                })
                .collect::<Result<Vec<(String, String)>, D::Error>>()
                .map(ColumnSelection::Mapping),
            _ => Err(D::Error::custom("columns must be a list or a mapping")),
        }
    }
}

impl Serialize for ColumnSelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ColumnSelection::List(names) => names.serialize(serializer),
            ColumnSelection::Mapping(pairs) => serializer.collect_map(pairs.iter().map(|(k, v)| (k, v))),
        }
    }
}

/// Shape of nested JSON records.
///
/// ```json
/// { "root": ["event_id"], "nested": { "amounts": ["amount_inr", "amount_usd"] } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonStructure {
    #[serde(default)]
    pub root: Vec<String>,

    /// Groups in configuration order
    #[serde(
        default,
        deserialize_with = "ordered_groups",
        serialize_with = "serialize_groups"
    )]
    pub nested: Vec<(String, Vec<String>)>,
}

fn ordered_groups<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<(String, Vec<String>)>, D::Error> {
    Map::<String, JsonValue>::deserialize(deserializer)?
        .into_iter()
        .map(|(group, fields)| {
            Vec::<String>::deserialize(fields)
                .map(|fields| (group, fields))
                .map_err(D::Error::custom)
        })
        .collect()
}

fn serialize_groups<S: Serializer>(groups: &[(String, Vec<String>)], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(groups.iter().map(|(k, v)| (k, v)))
}

/// The `restructure` section of a pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestructureSpec {
    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<ColumnSelection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_structure: Option<JsonStructure>,
}

impl RestructureSpec {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn with_columns(mut self, columns: ColumnSelection) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_structure(mut self, structure: JsonStructure) -> Self {
        self.json_structure = Some(structure);
        self
    }
}

/// The in-memory result of a restructure.
#[derive(Debug, Clone, PartialEq)]
pub enum Restructured {
    Dataset(Dataset),
    Records(Vec<JsonValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestructureOutput {
    pub format: OutputFormat,
    pub data: Restructured,
    /// File written to `output_path`, if any
    pub written: Option<PathBuf>,
}

impl RestructureOutput {
    pub fn dataset(&self) -> Option<&Dataset> {
        match &self.data {
            Restructured::Dataset(ds) => Some(ds),
            Restructured::Records(_) => None,
        }
    }

    pub fn records(&self) -> Option<&[JsonValue]> {
        match &self.data {
            Restructured::Records(records) => Some(records),
            Restructured::Dataset(_) => None,
        }
    }
}

/// Project and shape `dataset` according to `spec`.
///
/// Column selection is validated before anything is written.
pub fn restructure(dataset: &Dataset, spec: &RestructureSpec) -> RestructureResult<RestructureOutput> {
    let projected = match &spec.columns {
        Some(selection) => selection.apply(dataset)?,
        None => dataset.clone(),
    };
    let path = spec.output_path.as_deref();

    let data = match spec.format {
        OutputFormat::Dataframe => Restructured::Dataset(projected),
        OutputFormat::Csv => {
            if let Some(path) = path {
                writers::write_csv(&projected, path)?;
            }
            Restructured::Dataset(projected)
        }
        OutputFormat::Excel => {
            if let Some(path) = path {
                writers::write_excel(&projected, path)?;
            }
            Restructured::Dataset(projected)
        }
        OutputFormat::Json => {
            let records = match &spec.json_structure {
                Some(structure) => to_tree(&projected, structure)?,
                None => to_records(&projected)?,
            };
            if let Some(path) = path {
                writers::write_json(&records, path)?;
            }
            Restructured::Records(records)
        }
    };

    let written = match spec.format {
        OutputFormat::Dataframe => None,
        _ => path.map(Path::to_path_buf),
    };
    if let Some(path) = &written {
        log_info(format!("Wrote {:?} output to {}", spec.format, path.display()));
    }

    Ok(RestructureOutput {
        format: spec.format,
        data,
        written,
    })
}
