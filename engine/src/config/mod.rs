//! Pipeline configuration.
//!
//! A single JSON document with one section per phase:
//!
//! ```json
//! {
//!   "extract":     {"source": {"type": "csv", "path": "calls.csv"}, "columns": [...]},
//!   "transform":   {"transformations": [...]},
//!   "restructure": {"format": "json", "output_path": "out.json"},
//!   "load":        {"destination": {"type": "local", "path": "final/out.json"}}
//! }
//! ```
//!
//! `transform` and `restructure` are optional. Any string value may contain
//! `${VAR}` placeholders, expanded from the environment before parsing.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::load::LoadConfig;
use crate::projection::{ColumnSpec, ColumnType, KeyConfig, KeyType, NumericKind};
use crate::restructure::{JsonStructure, OutputFormat, RestructureSpec};
use crate::source::{ExtractConfig, SourceConfig};
use crate::transform::TransformConfig;

static ENV_PLACEHOLDER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").ok());

/// A complete ETL run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub extract: ExtractConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restructure: Option<RestructureSpec>,

    pub load: LoadConfig,
}

impl PipelineConfig {
    /// Parse, expand and validate from a JSON string
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Read a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Expand `${VAR}` placeholders, then parse and validate.
    pub fn from_value(value: &JsonValue) -> ConfigResult<Self> {
        let expanded = expand_env(value)?;
        let config = Self::deserialize(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        match &self.transform {
            Some(transform) => transform.validate(),
            None => Ok(()),
        }
    }

    /// A call-record pipeline touching every section.
    pub fn example() -> Self {
        let extract = ExtractConfig::new(SourceConfig::Csv {
            path: "data/calls.csv".into(),
            delimiter: None,
        })
        .with_column(ColumnSpec::new("account_sid", ColumnType::String))
        .with_column(ColumnSpec::new("start_time", ColumnType::Date))
        .with_column(ColumnSpec::new("end_time", ColumnType::Date))
        .with_column(
            ColumnSpec::new("price", ColumnType::Numeric)
                .with_output_name("amount_inr")
                .with_data_type(NumericKind::Float),
        )
        .with_column(ColumnSpec::new("metadata", ColumnType::Json).with_key(KeyConfig::Detailed {
            path: "caller.city".into(),
            output_name: Some("city".into()),
            value_type: Some(KeyType::String),
        }));

        let restructure = RestructureSpec::new(OutputFormat::Json)
            .with_output_path("output/calls.json")
            .with_structure(JsonStructure {
                root: vec!["account_sid".into(), "amount_inr".into(), "amount_usd".into()],
                nested: vec![(
                    "call".into(),
                    vec!["start_time".into(), "end_time".into(), "city".into()],
                )],
            });

        Self {
            extract,
            transform: Some(TransformConfig::example()),
            restructure: Some(restructure),
            load: LoadConfig::local("final/calls.json"),
        }
    }
}

/// Replace every `${VAR}` in string values (not keys) with the variable's value.
pub fn expand_env(value: &JsonValue) -> ConfigResult<JsonValue> {
    match value {
        JsonValue::String(s) => expand_str(s).map(JsonValue::String),
        JsonValue::Array(items) => items.iter().map(expand_env).collect::<ConfigResult<Vec<_>>>().map(JsonValue::Array),
        JsonValue::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), expand_env(v)?)))
            .collect::<ConfigResult<serde_json::Map<_, _>>>()
            .map(JsonValue::Object),
        other => Ok(other.clone()),
    }
}

fn expand_str(text: &str) -> ConfigResult<String> {
    let Some(placeholder) = ENV_PLACEHOLDER.as_ref() else {
        return Ok(text.to_string());
    };
    let mut missing = None;
    let expanded = placeholder.replace_all(text, |caps: &Captures| {
        let name = &caps[1];
        std::env::var(name).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| name.to_string());
            String::new()
        })
    });
    match missing {
        Some(name) => Err(ConfigError::MissingEnv(name)),
        None => Ok(expanded.into_owned()),
    }
}
