//! # Tabflow - configuration-driven ETL
//!
//! Tabflow reads rows from a source, projects them into a typed in-memory
//! dataset, runs a declarative list of transformation steps over it, reshapes
//! the result and hands the artifact to a destination.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌─────────────┐   ┌─────────────┐   ┌────────┐
//! │  Source  │──▶│ Projection │──▶│  Transform  │──▶│ Restructure │──▶│  Load  │
//! │ file/sql │   │ (coercion) │   │ (+ wasm ext)│   │ json/csv/xl │   │ local  │
//! └──────────┘   └────────────┘   └─────────────┘   └─────────────┘   └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabflow::{run_etl, PipelineConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::from_file("etl.json")?;
//!     let report = run_etl(&config)?;
//!     println!("Loaded {} rows into {}", report.rows, report.destination.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`logs`] - Log broadcasting
//! - [`models`] - Cell values and the columnar dataset
//! - [`source`] - Raw row readers and the SQL builder
//! - [`projection`] - Column projection and type coercion
//! - [`transform`] - Step configuration and interpreter
//! - [`extension`] - Custom functions (WebAssembly and native)
//! - [`restructure`] - Column selection, nesting and file output
//! - [`load`] - Destination writer
//! - [`config`] - Pipeline configuration
//! - [`pipeline`] - Orchestration

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Phases
pub mod source;
pub mod projection;
pub mod transform;
pub mod extension;
pub mod restructure;
pub mod load;

// Orchestration
pub mod config;
pub mod pipeline;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, DatasetError, ExtensionError, LoadError, PipelineError, ProjectionError, RestructureError,
    SourceError, TransformError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Column, Dataset, Value};

// =============================================================================
// Re-exports - Phases
// =============================================================================

pub use extension::{ExtensionFunction, ExtensionRegistry, WasmExtension};
pub use load::{load, Destination, LoadConfig};
pub use projection::{project, ColumnSpec, ColumnType, KeyConfig, KeyType, NumericKind};
pub use restructure::{
    restructure, to_records, ColumnSelection, JsonStructure, OutputFormat, RestructureOutput, RestructureSpec,
    Restructured,
};
pub use source::{build_query, fetch_rows, ExtractConfig, SourceConfig, SourceRows};
pub use transform::{
    operations_description, transform, AggregateOp, ArithmeticOp, TransformConfig, TransformStep,
};

// =============================================================================
// Re-exports - Orchestration
// =============================================================================

pub use config::PipelineConfig;
pub use logs::{LogEntry, LogLevel, LOG_BROADCASTER};
pub use pipeline::{extract, run_etl, run_etl_with_registry, PipelineContext, RunReport};
