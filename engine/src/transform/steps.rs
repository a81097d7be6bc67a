//! Transformation configuration
//!
//! An ordered list of steps, each tagged by `type`:
//!
//! ```json
//! { "transformations": [
//!     { "type": "arithmetic", "columns": ["price", "qty"], "operation": "multiply",
//!       "output_column": "total" },
//!     { "type": "aggregate", "columns": ["total"], "operation": "sum",
//!       "group_by": ["customer"], "output_column": "customer_total" },
//!     { "type": "custom_file", "columns": ["total"], "file_path": "ext/currency.wat",
//!       "function_name": "convert_to_usd", "parameters": { "conversion_rate": 0.012 },
//!       "output_column": "total_usd" }
//! ] }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use crate::error::{ConfigError, ConfigResult};

/// Element-wise binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Subtract => "subtract",
            ArithmeticOp::Multiply => "multiply",
            ArithmeticOp::Divide => "divide",
        }
    }
}

/// Group-level reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    Sum,
    Mean,
    Count,
}

impl AggregateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOp::Sum => "sum",
            AggregateOp::Mean => "mean",
            AggregateOp::Count => "count",
        }
    }
}

/// One transformation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformStep {
    /// `columns[0] <op> columns[1]`, row by row
    Arithmetic {
        columns: Vec<String>,
        output_column: String,
        operation: ArithmeticOp,
    },

    /// Reduce `columns` per `group_by` group and broadcast onto every row
    Aggregate {
        columns: Vec<String>,
        output_column: String,
        operation: AggregateOp,
        group_by: Vec<String>,
    },

    /// Call an extension function with the input columns and keyword parameters
    CustomFile {
        columns: Vec<String>,
        output_column: String,
        file_path: String,
        function_name: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        parameters: Map<String, JsonValue>,
    },
}

impl TransformStep {
    /// The `type` tag of this step
    pub fn kind(&self) -> &'static str {
        match self {
            TransformStep::Arithmetic { .. } => "arithmetic",
            TransformStep::Aggregate { .. } => "aggregate",
            TransformStep::CustomFile { .. } => "custom_file",
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            TransformStep::Arithmetic { columns, .. }
            | TransformStep::Aggregate { columns, .. }
            | TransformStep::CustomFile { columns, .. } => columns,
        }
    }

    pub fn output_column(&self) -> &str {
        match self {
            TransformStep::Arithmetic { output_column, .. }
            | TransformStep::Aggregate { output_column, .. }
            | TransformStep::CustomFile { output_column, .. } => output_column,
        }
    }

    /// Structural checks that do not depend on the dataset.
    fn validate(&self, index: usize) -> ConfigResult<()> {
        let invalid = |message: String| ConfigError::InvalidStep {
            index,
            kind: self.kind(),
            message,
        };

        if self.output_column().is_empty() {
            return Err(invalid("output_column must not be empty".into()));
        }

        match self {
            TransformStep::Arithmetic { columns, .. } if columns.len() != 2 => Err(invalid(format!(
                "expects exactly 2 columns, got {}",
                columns.len()
            ))),
            TransformStep::Aggregate { group_by, .. } if group_by.is_empty() => {
                Err(invalid("group_by must name at least one column".into()))
            }
            TransformStep::CustomFile { file_path, function_name, .. }
                if file_path.is_empty() || function_name.is_empty() =>
            {
                Err(invalid("file_path and function_name are required".into()))
            }
            _ if self.columns().is_empty() => Err(invalid("expects at least one column".into())),
            _ => Ok(()),
        }
    }
}

/// The `transform` section of a pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub transformations: Vec<TransformStep>,
}

impl TransformConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate from a JSON string
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate from a JSON value
    pub fn from_value(value: &JsonValue) -> ConfigResult<Self> {
        let config = Self::deserialize(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.transformations
            .iter()
            .enumerate()
            .try_for_each(|(index, step)| step.validate(index))
    }

    pub fn with_step(mut self, step: TransformStep) -> Self {
        self.transformations.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.transformations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformations.is_empty()
    }

    /// A configuration exercising every step type.
    pub fn example() -> Self {
        Self::new()
            .with_step(TransformStep::Arithmetic {
                columns: vec!["end_time".into(), "start_time".into()],
                output_column: "duration".into(),
                operation: ArithmeticOp::Subtract,
            })
            .with_step(TransformStep::Aggregate {
                columns: vec!["amount_inr".into()],
                output_column: "total_by_account".into(),
                operation: AggregateOp::Sum,
                group_by: vec!["account_sid".into()],
            })
            .with_step(TransformStep::CustomFile {
                columns: vec!["amount_inr".into()],
                output_column: "amount_usd".into(),
                file_path: "extensions/currency.wat".into(),
                function_name: "convert_to_usd".into(),
                parameters: match json!({"conversion_rate": 0.012}) {
                    JsonValue::Object(map) => map,
                    _ => Map::new(),
                },
            })
    }
}

/// Human-readable reference of the step types and their operations.
pub fn operations_description() -> String {
    r#"Available transformation steps:

| Step | Operations | Fields |
|------|------------|--------|
| arithmetic | add, subtract, multiply, divide | columns: [left, right], operation, output_column |
| aggregate | sum, mean, count | columns: [value], operation, group_by: [keys], output_column |
| custom_file | - | columns, file_path, function_name, parameters?, output_column |

Arithmetic is element-wise; a null on either side gives null, division by zero
gives inf or NaN. Timestamps subtract to durations.

Aggregates are broadcast back to every row of the group, so the row count
never changes.

custom_file loads a WebAssembly module (.wasm or .wat) and calls an exported
function, either once per row (f64 params -> f64, keyword parameters appended
in order) or once per column batch ((ptr, len) -> packed ptr/len over JSON).

Example steps in JSON:
[
  {"type": "arithmetic", "columns": ["end_time", "start_time"], "operation": "subtract", "output_column": "duration"},
  {"type": "aggregate", "columns": ["amount"], "operation": "sum", "group_by": ["account"], "output_column": "total"},
  {"type": "custom_file", "columns": ["amount"], "file_path": "ext/currency.wat",
   "function_name": "convert_to_usd", "parameters": {"conversion_rate": 0.012}, "output_column": "amount_usd"}
]"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_step_types() {
        let config = TransformConfig::from_value(&json!({
            "transformations": [
                {"type": "arithmetic", "columns": ["a", "b"], "operation": "divide", "output_column": "ratio"},
                {"type": "aggregate", "columns": ["v"], "operation": "count", "group_by": ["g"], "output_column": "n"},
                {"type": "custom_file", "columns": ["v"], "file_path": "f.wat", "function_name": "f", "output_column": "w"}
            ]
        }))
        .unwrap();

        assert_eq!(config.len(), 3);
        assert_eq!(config.transformations[0].kind(), "arithmetic");
        assert_eq!(config.transformations[1].output_column(), "n");
        assert!(matches!(
            &config.transformations[2],
            TransformStep::CustomFile { parameters, .. } if parameters.is_empty()
        ));
    }

    #[test]
    fn test_unknown_type_and_operation_rejected() {
        let unknown_type = json!({"transformations": [
            {"type": "pivot", "columns": ["a"], "output_column": "b"}
        ]});
        assert!(matches!(TransformConfig::from_value(&unknown_type), Err(ConfigError::Json(_))));

        let unknown_op = json!({"transformations": [
            {"type": "arithmetic", "columns": ["a", "b"], "operation": "modulo", "output_column": "c"}
        ]});
        assert!(matches!(TransformConfig::from_value(&unknown_op), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_arithmetic_arity_checked() {
        let config = json!({"transformations": [
            {"type": "arithmetic", "columns": ["a"], "operation": "add", "output_column": "c"}
        ]});
        let err = TransformConfig::from_value(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStep { index: 0, kind: "arithmetic", .. }));
    }

    #[test]
    fn test_aggregate_requires_group_by() {
        let config = json!({"transformations": [
            {"type": "aggregate", "columns": ["v"], "operation": "sum", "group_by": [], "output_column": "s"}
        ]});
        assert!(TransformConfig::from_value(&config).is_err());
    }

    #[test]
    fn test_missing_transformations_is_empty() {
        let config = TransformConfig::from_json("{}").unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_example_roundtrips() {
        let example = TransformConfig::example();
        let parsed = TransformConfig::from_json(&example.to_json().unwrap()).unwrap();
        assert_eq!(parsed, example);
    }
}
