//! Error types for the tabflow ETL pipeline.
//!
//! One error enum per layer, mirroring the data flow:
//!
//! - [`DatasetError`] - Column bookkeeping on the in-memory dataset
//! - [`ConfigError`] - Configuration loading and parse-time validation
//! - [`SourceError`] - Reading raw rows from a source
//! - [`ProjectionError`] - Building the working dataset from raw rows
//! - [`ExtensionError`] - Loading and invoking extension functions
//! - [`TransformError`] - Executing transformation steps
//! - [`RestructureError`] - Projecting and serializing the output
//! - [`LoadError`] - Handing the artifact to its destination
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Dataset Errors
// =============================================================================

/// Errors raised by [`crate::models::Dataset`] column operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    /// A referenced column does not exist.
    #[error("Column not found: {0}")]
    MissingColumn(String),

    /// A column name appears twice.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// A column does not have the dataset's row count.
    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while reading or validating a pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON, missing key or unknown tag.
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A transformation step is structurally invalid.
    #[error("Invalid {kind} step #{index}: {message}")]
    InvalidStep {
        index: usize,
        kind: &'static str,
        message: String,
    },

    /// A `${VAR}` placeholder names an unset environment variable.
    #[error("Environment variable not set: {0}")]
    MissingEnv(String),
}

// =============================================================================
// Source Errors
// =============================================================================

/// Errors while reading raw rows from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read the source file.
    #[error("Failed to read source {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file could not be parsed.
    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A record is not a JSON object.
    #[error("Record {0} is not a JSON object")]
    NotAnObject(usize),

    /// The source type has no connector in this build.
    #[error("Unsupported source type: {0}")]
    Unsupported(String),

    /// The query builder needs a table-backed source.
    #[error("Source type '{0}' has no table to query")]
    NoTable(String),

    /// Opening or querying a database file failed.
    #[error("Database {}: {source}", path.display())]
    Database {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
}

// =============================================================================
// Projection Errors
// =============================================================================

/// Errors while projecting raw rows into the working dataset.
///
/// Coercion failures are never errors: they map to `Value::Null`.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

// =============================================================================
// Extension Errors
// =============================================================================

/// Errors while loading or invoking an extension function.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// The extension file does not exist.
    #[error("Extension file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// The extension file exists but could not be read.
    #[error("Failed to read extension {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid module or failed to instantiate.
    #[error("Could not load module from {}: {message}", path.display())]
    InvalidModule { path: PathBuf, message: String },

    /// The module does not export the requested function.
    #[error("Function {function} not found in {}", path.display())]
    FunctionNotFound { path: PathBuf, function: String },

    /// The exported function matches no supported calling convention.
    #[error("Function {function} has an unsupported signature: {signature}")]
    UnsupportedSignature { function: String, signature: String },

    /// An argument cannot be passed to the function.
    #[error("Invalid argument for {function}: {message}")]
    InvalidArgument { function: String, message: String },

    /// The function trapped or reported a failure.
    #[error("{function} failed: {message}")]
    Execution { function: String, message: String },

    /// The returned column does not have one value per row.
    #[error("{function} returned {actual} values, expected {expected}")]
    LengthMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors while executing transformation steps.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A referenced column is missing, or a produced column is malformed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// The step list failed structural validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Arithmetic on operand types that have no defined result.
    #[error("Step #{step}: cannot {operation} {left} and {right} (row {row})")]
    IncompatibleOperands {
        step: usize,
        operation: &'static str,
        left: &'static str,
        right: &'static str,
        row: usize,
    },

    /// sum/mean over a non-numeric value.
    #[error("Step #{step}: cannot {operation} {kind} value in column '{column}'")]
    NonNumericAggregate {
        step: usize,
        operation: &'static str,
        column: String,
        kind: &'static str,
    },

    /// An aggregate would overwrite an existing column.
    #[error("Step #{step}: output column '{column}' already exists")]
    ColumnExists { step: usize, column: String },

    /// Any failure inside a `custom_file` step.
    #[error("Error in custom transformation {function} from {path}: {source}")]
    CustomFunction {
        function: String,
        path: String,
        #[source]
        source: ExtensionError,
    },
}

// =============================================================================
// Restructure Errors
// =============================================================================

/// Errors while projecting or serializing the output.
#[derive(Debug, Error)]
pub enum RestructureError {
    /// A selected column is missing.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// A value has no JSON representation.
    #[error("Object of type {kind} in column '{column}' is not JSON serializable")]
    Unserializable { column: String, kind: &'static str },

    /// Failed to write the output file.
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV writer failed on the output file.
    #[error("Failed to write CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The workbook could not be built or saved.
    #[error("Failed to write workbook {}: {source}", path.display())]
    Excel {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Load Errors
// =============================================================================

/// Errors while handing the artifact to its destination.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The artifact to load does not exist.
    #[error("Source file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// Failed to create, move or copy a file.
    #[error("Failed to load into {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::pipeline::run_etl`] and by the
/// [`crate::pipeline::PipelineContext`] phase methods.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extract error: {0}")]
    Source(#[from] SourceError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Restructure error: {0}")]
    Restructure(#[from] RestructureError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Transform or restructure ran before a dataset was set.
    #[error("No dataset set. Use set_dataset() first.")]
    NoDataset,

    /// `set_dataset` was called a second time in the same run.
    #[error("A dataset is already set for this run")]
    DatasetAlreadySet,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for projection operations.
pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Result type for extension operations.
pub type ExtensionResult<T> = Result<T, ExtensionError>;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for restructure operations.
pub type RestructureResult<T> = Result<T, RestructureError>;

/// Result type for load operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
