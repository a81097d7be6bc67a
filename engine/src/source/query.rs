//! SELECT generation for table-backed sources.
//!
//! ```text
//! SELECT event_id, Description FROM BillEvent
//!   WHERE CAST(JSON_EXTRACT(Description, "$.amount") AS DECIMAL(10,2)) > 100
//!   ORDER BY event_id DESC LIMIT 10, 5
//! ```
//!
//! SQLite gets the same statement with single-quoted JSON paths.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{ExtractConfig, SourceConfig};
use crate::error::{SourceError, SourceResult};
use crate::projection::{ColumnSpec, ColumnType, KeyType};

/// One `where` entry: `{"condition": {"column": ..., "operator": ..., "value": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Source column, or the `output_name` of a json key
    pub column: String,
    /// SQL comparison operator, emitted as written
    pub operator: String,
    pub value: JsonValue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    #[serde(default)]
    pub offset: u64,
    /// No LIMIT clause is generated without a count
    #[serde(default)]
    pub count: Option<u64>,
}

/// SQL flavor of the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Mysql,
    Sqlite,
}

impl Dialect {
    /// The `$.path` argument of `JSON_EXTRACT`.
    fn json_path(&self, path: &str) -> String {
        match self {
            Dialect::Mysql => format!("\"$.{path}\""),
            Dialect::Sqlite => quote(&format!("$.{path}")),
        }
    }
}

/// A json key addressed by a condition.
struct JsonTarget<'a> {
    column: &'a str,
    path: &'a str,
    numeric: bool,
}

/// Build the full SELECT statement for a table-backed extract configuration.
pub fn build_query(config: &ExtractConfig) -> SourceResult<String> {
    let (table, dialect) = match &config.source {
        SourceConfig::Mysql { table, .. } => (table, Dialect::Mysql),
        SourceConfig::Sqlite { table, .. } => (table, Dialect::Sqlite),
        other => return Err(SourceError::NoTable(other.kind().to_string())),
    };

    let names = if config.columns.is_empty() {
        "*".to_string()
    } else {
        config
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut query = format!("SELECT {names} FROM {table}");
    query.push_str(&build_where_clause(&config.conditions, &config.columns, dialect));
    query.push_str(&build_order_by_clause(&config.order_by));
    if let Some(limit) = &config.limit {
        query.push_str(&build_limit_clause(limit));
    }
    Ok(query)
}

/// ` WHERE a AND b ...`, or empty without conditions.
pub fn build_where_clause(conditions: &[WhereClause], columns: &[ColumnSpec], dialect: Dialect) -> String {
    if conditions.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = conditions
        .iter()
        .map(|WhereClause { condition }| {
            let target = find_json_target(columns, &condition.column);
            let numeric = target.as_ref().is_some_and(|t| t.numeric);
            let value = sql_literal(&condition.value, numeric);

            match target {
                Some(t) if t.numeric => format!(
                    "CAST(JSON_EXTRACT({}, {}) AS DECIMAL(10,2)) {} {}",
                    t.column,
                    dialect.json_path(t.path),
                    condition.operator,
                    value
                ),
                Some(t) => format!(
                    "JSON_EXTRACT({}, {}) {} {}",
                    t.column,
                    dialect.json_path(t.path),
                    condition.operator,
                    value
                ),
                None => format!("{} {} {}", condition.column, condition.operator, value),
            }
        })
        .collect();

    format!(" WHERE {}", parts.join(" AND "))
}

/// ` ORDER BY a ASC, b DESC`, or empty.
pub fn build_order_by_clause(order_by: &[OrderBy]) -> String {
    if order_by.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = order_by
        .iter()
        .map(|o| format!("{} {}", o.column, o.direction.as_sql()))
        .collect();
    format!(" ORDER BY {}", parts.join(", "))
}

/// ` LIMIT count` or ` LIMIT offset, count`.
pub fn build_limit_clause(limit: &Limit) -> String {
    match limit.count {
        None => String::new(),
        Some(count) if limit.offset > 0 => format!(" LIMIT {}, {}", limit.offset, count),
        Some(count) => format!(" LIMIT {count}"),
    }
}

fn find_json_target<'a>(columns: &'a [ColumnSpec], name: &str) -> Option<JsonTarget<'a>> {
    columns
        .iter()
        .filter(|c| c.column_type == ColumnType::Json)
        .find_map(|c| {
            c.keys
                .iter()
                .find(|k| k.output_name() == Some(name))
                .map(|k| JsonTarget {
                    column: &c.name,
                    path: k.path(),
                    numeric: k.value_type() == Some(KeyType::Numeric),
                })
        })
}

/// Render a condition value. Strings are quoted unless compared numerically.
fn sql_literal(value: &JsonValue, numeric: bool) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::String(s) if numeric => s.clone(),
        JsonValue::String(s) => quote(s),
        JsonValue::Bool(b) => String::from(if *b { "TRUE" } else { "FALSE" }),
        JsonValue::Number(n) => n.to_string(),
        other => quote(&other.to_string()),
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: JsonValue) -> ExtractConfig {
        serde_json::from_value(value).unwrap()
    }

    fn mysql(extra: JsonValue) -> JsonValue {
        let mut base = json!({
            "source": {"type": "mysql", "host": "localhost", "database": "testdb",
                       "user": "root", "password": "", "table": "BillEvent"},
            "columns": [
                {"name": "event_id", "type": "string"},
                {"name": "Description", "type": "json", "keys": [
                    {"path": "amount", "output_name": "amount", "type": "numeric"},
                    {"path": "currency", "output_name": "currency"}
                ]}
            ]
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        base
    }

    #[test]
    fn test_plain_select() {
        let query = build_query(&config(mysql(json!({})))).unwrap();
        assert_eq!(query, "SELECT event_id, Description FROM BillEvent");
    }

    #[test]
    fn test_where_on_json_keys() {
        let query = build_query(&config(mysql(json!({"where": [
            {"condition": {"column": "amount", "operator": ">", "value": "100"}},
            {"condition": {"column": "currency", "operator": "=", "value": "INR"}},
            {"condition": {"column": "event_id", "operator": "!=", "value": null}}
        ]})))).unwrap();

        assert_eq!(
            query,
            "SELECT event_id, Description FROM BillEvent WHERE \
             CAST(JSON_EXTRACT(Description, \"$.amount\") AS DECIMAL(10,2)) > 100 AND \
             JSON_EXTRACT(Description, \"$.currency\") = 'INR' AND \
             event_id != NULL"
        );
    }

    #[test]
    fn test_order_and_limit() {
        let query = build_query(&config(mysql(json!({
            "order_by": [{"column": "event_id", "direction": "DESC"}, {"column": "Description"}],
            "limit": {"offset": 10, "count": 5}
        })))).unwrap();

        assert!(query.ends_with(" ORDER BY event_id DESC, Description ASC LIMIT 10, 5"));
    }

    #[test]
    fn test_limit_variants() {
        assert_eq!(build_limit_clause(&Limit { offset: 0, count: Some(3) }), " LIMIT 3");
        assert_eq!(build_limit_clause(&Limit { offset: 4, count: None }), "");
    }

    #[test]
    fn test_string_values_are_escaped() {
        let clause = build_where_clause(
            &[WhereClause {
                condition: Condition {
                    column: "name".into(),
                    operator: "=".into(),
                    value: json!("O'Brien"),
                },
            }],
            &[],
            Dialect::Mysql,
        );
        assert_eq!(clause, " WHERE name = 'O''Brien'");
    }

    #[test]
    fn test_sqlite_quotes_json_paths_as_strings() {
        let query = build_query(&config(json!({
            "source": {"type": "sqlite", "path": "billing.db", "table": "BillEvent"},
            "columns": [
                {"name": "Description", "type": "json", "keys": [
                    {"path": "amount", "output_name": "amount", "type": "numeric"},
                    {"path": "currency", "output_name": "currency"}
                ]}
            ],
            "where": [
                {"condition": {"column": "amount", "operator": ">=", "value": 50}},
                {"condition": {"column": "currency", "operator": "=", "value": "INR"}}
            ]
        })))
        .unwrap();

        assert_eq!(
            query,
            "SELECT Description FROM BillEvent WHERE \
             CAST(JSON_EXTRACT(Description, '$.amount') AS DECIMAL(10,2)) >= 50 AND \
             JSON_EXTRACT(Description, '$.currency') = 'INR'"
        );
    }

    #[test]
    fn test_file_source_has_no_table() {
        let cfg = config(json!({"source": {"type": "json", "path": "rows.json"}}));
        assert!(matches!(build_query(&cfg), Err(SourceError::NoTable(kind)) if kind == "json"));
    }
}
