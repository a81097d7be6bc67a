//! Source connectors: where raw rows come from.
//!
//! File sources (`json`, `csv`) are read fully into memory. Table sources get a
//! generated SELECT: `sqlite` runs it against a database file, while `mysql`
//! only has its query printed (`tabflow query`) since no MySQL driver ships
//! with this crate.

pub mod csv;
pub mod json;
pub mod query;
pub mod sqlite;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::path::PathBuf;

use crate::error::{SourceError, SourceResult};
use crate::logs::{log_info, log_info_indent};
use crate::models::Dataset;
use crate::projection::ColumnSpec;

pub use query::{build_query, Condition, Dialect, Limit, OrderBy, SortDirection, WhereClause};

fn default_port() -> u16 {
    3306
}

/// Where to read rows from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    Json {
        path: PathBuf,
    },
    Csv {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delimiter: Option<char>,
    },
    Mysql {
        host: String,
        #[serde(default = "default_port")]
        port: u16,
        database: String,
        user: String,
        #[serde(default)]
        password: String,
        table: String,
    },
    Sqlite {
        path: PathBuf,
        table: String,
    },
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Json { .. } => "json",
            SourceConfig::Csv { .. } => "csv",
            SourceConfig::Mysql { .. } => "mysql",
            SourceConfig::Sqlite { .. } => "sqlite",
        }
    }
}

/// The `extract` section of a pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(rename = "where", default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<WhereClause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Limit>,
}

impl ExtractConfig {
    pub fn new(source: SourceConfig) -> Self {
        Self {
            source,
            columns: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn with_column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }
}

/// Raw rows plus the column names the source declared.
///
/// `headers` lets a header-only CSV or an empty query result still carry its
/// columns. JSON sources declare none; their columns come from the record keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRows {
    pub headers: Vec<String>,
    pub rows: Vec<Map<String, JsonValue>>,
}

impl SourceRows {
    pub fn from_records(rows: Vec<Map<String, JsonValue>>) -> Self {
        Self {
            headers: Vec::new(),
            rows,
        }
    }

    /// The untyped dataset: declared headers first, then any other record keys.
    pub fn to_dataset(&self) -> Dataset {
        Dataset::from_rows(&self.headers, &self.rows)
    }
}

/// Read the raw rows named by `config.source`.
///
/// `where`, `order_by` and `limit` only shape the generated SQL; they are not
/// applied to file sources.
pub fn fetch_rows(config: &ExtractConfig) -> SourceResult<SourceRows> {
    let table = match &config.source {
        SourceConfig::Json { path } => {
            log_info(format!("Reading JSON source {}", path.display()));
            SourceRows::from_records(json::read_json(path)?)
        }
        SourceConfig::Csv { path, delimiter } => {
            log_info(format!("Reading CSV source {}", path.display()));
            csv::read_csv(path, *delimiter)?
        }
        SourceConfig::Sqlite { path, .. } => {
            log_info(format!("Querying SQLite source {}", path.display()));
            let query = build_query(config)?;
            log_info_indent(format!("Query: {query}"), 1);
            sqlite::read_sqlite(path, &query)?
        }
        SourceConfig::Mysql { .. } => {
            let query = build_query(config)?;
            log_info_indent(format!("Query: {query}"), 1);
            return Err(SourceError::Unsupported("mysql".into()));
        }
    };
    log_info_indent(format!("{} rows read", table.rows.len()), 1);
    Ok(table)
}
