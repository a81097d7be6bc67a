//! Transform Interpreter
//!
//! Executes the steps of a [`TransformConfig`] strictly in order. Later steps see the
//! columns produced by earlier ones. Column references are checked when the step
//! runs, not up front.

use serde_json::{Map, Value as JsonValue};

use super::steps::{TransformConfig, TransformStep};
use super::{aggregate, arithmetic};
use crate::error::{ExtensionError, ExtensionResult, TransformError, TransformResult};
use crate::extension::ExtensionRegistry;
use crate::logs::{log_info, log_info_indent, log_success};
use crate::models::{Dataset, Value};

/// Run every step on a copy of `dataset` and return the result.
///
/// `dataset` is left untouched when a step fails.
pub fn transform(
    dataset: &Dataset,
    config: &TransformConfig,
    registry: &ExtensionRegistry,
) -> TransformResult<Dataset> {
    config.validate()?;
    log_info(format!("Applying {} transformation(s)", config.len()));

    let mut working = dataset.clone();
    for (index, step) in config.transformations.iter().enumerate() {
        apply_step(&mut working, index, step, registry)?;
    }

    log_success(format!(
        "Transformations applied: {} rows, {} columns",
        working.row_count(),
        working.column_count()
    ));
    Ok(working)
}

/// Execute one step, writing its output column into `dataset`.
fn apply_step(
    dataset: &mut Dataset,
    index: usize,
    step: &TransformStep,
    registry: &ExtensionRegistry,
) -> TransformResult<()> {
    log_info_indent(
        format!(
            "#{} {} [{}] -> {}",
            index,
            step.kind(),
            step.columns().join(", "),
            step.output_column()
        ),
        1,
    );

    let values = match step {
        TransformStep::Arithmetic { columns, operation, .. } => {
            arithmetic::apply(dataset, index, *operation, &columns[0], &columns[1])?
        }
        TransformStep::Aggregate { columns, operation, group_by, output_column } => {
            aggregate::broadcast(dataset, index, *operation, columns, group_by, output_column)?
        }
        TransformStep::CustomFile { columns, file_path, function_name, parameters, .. } => {
            call_extension(dataset, registry, columns, file_path, function_name, parameters).map_err(
                |source| TransformError::CustomFunction {
                    function: function_name.clone(),
                    path: file_path.clone(),
                    source,
                },
            )?
        }
    };

    dataset.set_column(step.output_column(), values)?;
    Ok(())
}

fn call_extension(
    dataset: &Dataset,
    registry: &ExtensionRegistry,
    columns: &[String],
    file_path: &str,
    function_name: &str,
    parameters: &Map<String, JsonValue>,
) -> ExtensionResult<Vec<Value>> {
    let mut function = registry.resolve(file_path, function_name)?;

    let inputs = columns
        .iter()
        .map(|name| {
            dataset
                .column(name)
                .map(|c| c.values.as_slice())
                .ok_or_else(|| ExtensionError::InvalidArgument {
                    function: function_name.to_string(),
                    message: format!("column '{name}' not found"),
                })
        })
        .collect::<ExtensionResult<Vec<&[Value]>>>()?;

    let output = function.invoke(&inputs, parameters)?;
    if output.len() != dataset.row_count() {
        return Err(ExtensionError::LengthMismatch {
            function: function_name.to_string(),
            expected: dataset.row_count(),
            actual: output.len(),
        });
    }
    Ok(output)
}
