//! End-to-end orchestration: extract, transform, restructure, load.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabflow::{run_etl, PipelineConfig};
//!
//! let config = PipelineConfig::from_file("etl.json")?;
//! let report = run_etl(&config)?;
//! println!("{} rows -> {}", report.rows, report.destination.display());
//! ```

use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::extension::ExtensionRegistry;
use crate::load::load;
use crate::logs::{log_error, log_info, log_success};
use crate::models::Dataset;
use crate::projection::project;
use crate::restructure::{restructure, writers, OutputFormat, RestructureOutput, RestructureSpec, Restructured};
use crate::source::{fetch_rows, ExtractConfig};
use crate::transform::{transform, TransformConfig};

/// Working state of one run.
///
/// The dataset is set once after extraction; each transform replaces it
/// wholesale, so a failed step leaves the previous dataset in place.
#[derive(Debug, Default)]
pub struct PipelineContext {
    dataset: Option<Dataset>,
    registry: ExtensionRegistry,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: ExtensionRegistry) -> Self {
        Self {
            dataset: None,
            registry,
        }
    }

    pub fn registry_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.registry
    }

    /// Install the extracted dataset. Only allowed once per context.
    pub fn set_dataset(&mut self, dataset: Dataset) -> PipelineResult<()> {
        if self.dataset.is_some() {
            return Err(PipelineError::DatasetAlreadySet);
        }
        self.dataset = Some(dataset);
        Ok(())
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    /// Apply `config` to the current dataset and keep the result.
    pub fn transform(&mut self, config: &TransformConfig) -> PipelineResult<&Dataset> {
        let current = self.dataset.as_ref().ok_or(PipelineError::NoDataset)?;
        let next = transform(current, config, &self.registry)?;
        Ok(self.dataset.insert(next))
    }

    pub fn restructure(&self, spec: &RestructureSpec) -> PipelineResult<RestructureOutput> {
        let current = self.dataset.as_ref().ok_or(PipelineError::NoDataset)?;
        Ok(restructure(current, spec)?)
    }

    pub fn into_dataset(self) -> Option<Dataset> {
        self.dataset
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Rows in the final dataset
    pub rows: usize,
    /// Columns in the final dataset, before restructuring
    pub columns: usize,
    pub format: Option<OutputFormat>,
    /// Where the load phase put the artifact
    pub destination: PathBuf,
}

/// Read raw rows and project them into a dataset.
pub fn extract(config: &ExtractConfig) -> PipelineResult<Dataset> {
    let table = fetch_rows(config)?;
    Ok(project(table.to_dataset(), &config.columns)?)
}

/// Run a full pipeline with no native extensions registered.
pub fn run_etl(config: &PipelineConfig) -> PipelineResult<RunReport> {
    run_etl_with_registry(config, ExtensionRegistry::new())
}

pub fn run_etl_with_registry(config: &PipelineConfig, registry: ExtensionRegistry) -> PipelineResult<RunReport> {
    let result = run_phases(config, registry);
    match &result {
        Ok(_) => log_success("ETL process completed successfully!"),
        Err(e) => log_error(format!("Error during ETL process: {e}")),
    }
    result
}

fn run_phases(config: &PipelineConfig, registry: ExtensionRegistry) -> PipelineResult<RunReport> {
    let mut context = PipelineContext::with_registry(registry);

    log_info("Starting Extract phase...");
    let dataset = extract(&config.extract)?;
    log_success("Extract phase completed successfully.");
    context.set_dataset(dataset)?;

    if let Some(transform_config) = &config.transform {
        log_info("Starting Transform phase...");
        context.transform(transform_config)?;
        log_success("Transform phase completed successfully.");
    }

    let output = match &config.restructure {
        Some(spec) => {
            log_info("Starting Restructure phase...");
            let output = context.restructure(spec)?;
            log_success("Restructure phase completed successfully.");
            Some(output)
        }
        None => None,
    };

    let (rows, columns) = context
        .dataset()
        .map_or((0, 0), |ds| (ds.row_count(), ds.column_count()));

    log_info("Starting Load phase...");
    let artifact = match &output {
        Some(out) => stage(out)?,
        None => {
            let dataset = context.dataset().ok_or(PipelineError::NoDataset)?;
            stage_dataset(dataset)?
        }
    };
    let destination = load(&artifact, &config.load).map_err(|e| {
        discard(&artifact);
        e
    })?;
    log_success("Load phase completed successfully.");

    Ok(RunReport {
        rows,
        columns,
        format: output.as_ref().map(|o| o.format),
        destination,
    })
}

/// The file to hand to the loader: the written output, or a temporary copy.
fn stage(output: &RestructureOutput) -> PipelineResult<Staged> {
    if let Some(path) = &output.written {
        return Ok(Staged::Written(path.clone()));
    }
    match &output.data {
        Restructured::Dataset(dataset) => stage_dataset(dataset),
        Restructured::Records(records) => {
            let path = temp_path("json");
            writers::write_json(records, &path)?;
            Ok(Staged::Temporary(path))
        }
    }
}

fn stage_dataset(dataset: &Dataset) -> PipelineResult<Staged> {
    let path = temp_path("csv");
    writers::write_csv(dataset, &path)?;
    Ok(Staged::Temporary(path))
}

fn temp_path(extension: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tabflow-{}.{}", Uuid::new_v4(), extension))
}

/// An artifact ready for loading.
enum Staged {
    /// Produced by the restructure phase at its configured path
    Written(PathBuf),
    /// Created in the temp dir for this run
    Temporary(PathBuf),
}

impl std::ops::Deref for Staged {
    type Target = std::path::Path;

    fn deref(&self) -> &Self::Target {
        match self {
            Staged::Written(path) | Staged::Temporary(path) => path,
        }
    }
}

/// Remove a temporary artifact left behind by a failed load.
fn discard(artifact: &Staged) {
    if let Staged::Temporary(path) = artifact {
        // Best effort; the file may already be gone
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DatasetError, RestructureError};
    use crate::models::{Column, Value};
    use crate::source::SourceConfig;
    use serde_json::{json, Value as JsonValue};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_rows(dir: &Path, rows: JsonValue) -> PathBuf {
        let path = dir.join("rows.json");
        fs::write(&path, rows.to_string()).unwrap();
        path
    }

    fn config(value: JsonValue) -> PipelineConfig {
        PipelineConfig::from_value(&value).unwrap()
    }

    fn read_json(path: &Path) -> JsonValue {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_context_requires_dataset() {
        let mut context = PipelineContext::new();

        assert!(matches!(context.transform(&TransformConfig::new()), Err(PipelineError::NoDataset)));
        assert!(matches!(
            context.restructure(&RestructureSpec::default()),
            Err(PipelineError::NoDataset)
        ));
    }

    #[test]
    fn test_context_dataset_set_once() {
        let mut context = PipelineContext::new();
        context.set_dataset(Dataset::new()).unwrap();

        assert!(matches!(context.set_dataset(Dataset::new()), Err(PipelineError::DatasetAlreadySet)));
    }

    #[test]
    fn test_failed_transform_keeps_previous_dataset() {
        let mut context = PipelineContext::new();
        let ds = Dataset::from_columns(vec![Column::new("a", vec![Value::from("x")])]).unwrap();
        context.set_dataset(ds.clone()).unwrap();
        let bad = TransformConfig::from_value(&json!({"transformations": [
            {"type": "arithmetic", "columns": ["a", "a"], "operation": "multiply", "output_column": "b"}
        ]}))
        .unwrap();

        assert!(context.transform(&bad).is_err());
        assert_eq!(context.dataset(), Some(&ds));
    }

    #[test]
    fn test_context_uses_registered_natives() {
        let mut context = PipelineContext::new();
        context.registry_mut().register_native("ext/upper.wat", "upper", |columns, _| {
            Ok(columns[0]
                .iter()
                .map(|v| match v {
                    Value::String(s) => Value::String(s.to_uppercase()),
                    other => other.clone(),
                })
                .collect())
        });
        let ds = Dataset::from_columns(vec![Column::new("name", vec![Value::from("ada"), Value::Null])]).unwrap();
        context.set_dataset(ds).unwrap();

        context
            .transform(
                &TransformConfig::from_value(&json!({"transformations": [
                    {"type": "custom_file", "columns": ["name"], "file_path": "ext/upper.wat",
                     "function_name": "upper", "output_column": "name"}
                ]}))
                .unwrap(),
            )
            .unwrap();

        let result = context.into_dataset().unwrap();
        assert_eq!(result.get("name", 0), Some(&Value::from("ADA")));
        assert_eq!(result.get("name", 1), Some(&Value::Null));
    }

    #[test]
    fn test_nested_json_key_reaches_grouped_output() {
        let dir = TempDir::new().unwrap();
        let source = write_rows(dir.path(), json!([{"doc": {"a": {"b": 5}}}, {"doc": "{\"a\": {\"b\": 7}}"}]));
        let target = dir.path().join("final/out.json");

        let report = run_etl(&config(json!({
            "extract": {
                "source": {"type": "json", "path": source},
                "columns": [{"name": "doc", "type": "json", "keys": [{"path": "a.b", "output_name": "a_b"}]}]
            },
            "restructure": {"format": "json", "json_structure": {"root": [], "nested": {"grp": ["a_b"]}}},
            "load": {"destination": {"type": "local", "path": target}}
        })))
        .unwrap();

        assert_eq!(report.rows, 2);
        assert_eq!(report.destination, target);
        assert_eq!(read_json(&target), json!([{"grp": {"a_b": 5}}, {"grp": {"a_b": 7}}]));
    }

    #[test]
    fn test_column_list_orders_csv_output() {
        let dir = TempDir::new().unwrap();
        let source = write_rows(dir.path(), json!([{"a": "1", "b": "2", "c": "3"}]));
        let written = dir.path().join("out.csv");
        let target = dir.path().join("loaded/out.csv");

        run_etl(&config(json!({
            "extract": {"source": {"type": "json", "path": source}},
            "restructure": {"format": "csv", "output_path": written, "columns": ["b", "a"]},
            "load": {"destination": {"type": "local", "path": target}}
        })))
        .unwrap();

        assert!(!written.exists());
        assert_eq!(fs::read_to_string(&target).unwrap(), "b,a\n2,1\n");
    }

    #[test]
    fn test_missing_selected_column_is_fatal() {
        let dir = TempDir::new().unwrap();
        let source = write_rows(dir.path(), json!([{"a": "1"}]));
        let target = dir.path().join("out.csv");

        let err = run_etl(&config(json!({
            "extract": {"source": {"type": "json", "path": source}},
            "restructure": {"format": "csv", "columns": ["a", "zzz"]},
            "load": {"destination": {"type": "local", "path": target}}
        })))
        .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Restructure(RestructureError::Dataset(DatasetError::MissingColumn(_)))
        ));
        assert!(!target.exists());
    }

    #[test]
    fn test_flat_json_records_staged_and_loaded() {
        let dir = TempDir::new().unwrap();
        let source = write_rows(dir.path(), json!([{"id": "1", "v": "10"}, {"id": "2", "v": "x"}, {"id": "3", "v": ""}]));
        let target = dir.path().join("records.json");

        run_etl(&config(json!({
            "extract": {
                "source": {"type": "json", "path": source},
                "columns": [{"name": "v", "type": "numeric", "data_type": "int"}]
            },
            "restructure": {"format": "json"},
            "load": {"destination": {"type": "local", "path": target}}
        })))
        .unwrap();

        assert_eq!(
            read_json(&target),
            json!([{"id": "1", "v": 10}, {"id": "2", "v": null}, {"id": "3", "v": null}])
        );
    }

    #[test]
    fn test_transform_then_default_csv_load() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("sales.csv");
        fs::write(&source, "g;v\nx;10\nx;20\ny;5\n").unwrap();
        let target = dir.path().join("sales_out.csv");

        let cfg = config(json!({
            "extract": {
                "source": {"type": "csv", "path": source},
                "columns": [{"name": "v", "type": "numeric", "data_type": "int"}]
            },
            "transform": {"transformations": [
                {"type": "aggregate", "columns": ["v"], "operation": "sum", "group_by": ["g"], "output_column": "v_sum"}
            ]},
            "load": {"destination": {"type": "local", "path": target}}
        }));

        let report = run_etl(&cfg).unwrap();

        assert_eq!(report.columns, 3);
        assert!(report.format.is_none());
        assert_eq!(fs::read_to_string(&target).unwrap(), "g,v,v_sum\nx,10,30\nx,20,30\ny,5,5\n");
    }

    #[test]
    fn test_header_only_csv_keeps_selected_columns() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("empty.csv");
        fs::write(&source, "a,b\n").unwrap();
        let target = dir.path().join("empty_out.csv");

        let report = run_etl(&config(json!({
            "extract": {"source": {"type": "csv", "path": source}},
            "restructure": {"format": "csv", "columns": ["b", "a"]},
            "load": {"destination": {"type": "local", "path": target}}
        })))
        .unwrap();

        assert_eq!(report.rows, 0);
        assert_eq!(report.columns, 2);
        assert_eq!(fs::read_to_string(&target).unwrap(), "b,a\n");
    }

    #[test]
    fn test_sqlite_source_to_nested_json() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("calls.db");
        let conn = rusqlite::Connection::open(&db).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE calls (sid TEXT, price TEXT, metadata TEXT);
            INSERT INTO calls VALUES ('C1', '12.5', '{"caller": {"city": "Pune"}}');
            INSERT INTO calls VALUES ('C2', '3', '{"caller": {"city": "Goa"}}');
            INSERT INTO calls VALUES ('C3', '40', '{"caller": {"city": "Pune"}}');
            "#,
        )
        .unwrap();
        drop(conn);
        let target = dir.path().join("out/calls.json");

        let report = run_etl(&config(json!({
            "extract": {
                "source": {"type": "sqlite", "path": db, "table": "calls"},
                "columns": [
                    {"name": "sid", "type": "string"},
                    {"name": "price", "type": "numeric", "output_name": "amount"},
                    {"name": "metadata", "type": "json", "keys": [{"path": "caller.city", "output_name": "city"}]}
                ],
                "where": [{"condition": {"column": "city", "operator": "=", "value": "Pune"}}],
                "order_by": [{"column": "sid"}]
            },
            "restructure": {"format": "json", "json_structure": {"root": ["sid"], "nested": {"call": ["amount", "city"]}}},
            "load": {"destination": {"type": "local", "path": target}}
        })))
        .unwrap();

        assert_eq!(report.rows, 2);
        assert_eq!(
            read_json(&target),
            json!([
                {"sid": "C1", "call": {"amount": 12.5, "city": "Pune"}},
                {"sid": "C3", "call": {"amount": 40.0, "city": "Pune"}}
            ])
        );
    }

    #[test]
    fn test_extract_unsupported_source() {
        let cfg = ExtractConfig::new(SourceConfig::Mysql {
            host: "db".into(),
            port: 3306,
            database: "d".into(),
            user: "u".into(),
            password: String::new(),
            table: "t".into(),
        });
        assert!(matches!(extract(&cfg), Err(PipelineError::Source(_))));
    }
}
