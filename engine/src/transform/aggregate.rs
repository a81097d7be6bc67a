//! Group-level aggregation broadcast back onto every row.
//!
//! ```text
//! g  v         g  v   v_sum
//! x  10        x  10  30
//! x  20   →    x  20  30
//! y  5         y  5   5
//! ```

use chrono::{NaiveDateTime, TimeDelta};
use std::collections::HashMap;

use super::steps::AggregateOp;
use crate::error::{TransformError, TransformResult};
use crate::models::{Column, Dataset, Value};

/// Hashable image of a group-key cell. Missing values share one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Missing,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    Timestamp(NaiveDateTime),
    Duration(TimeDelta),
    Json(String),
}

impl From<&Value> for KeyPart {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => KeyPart::Missing,
            Value::Float(f) if f.is_nan() => KeyPart::Missing,
            // 1.0 and 1 land in the same group
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => KeyPart::Int(*f as i64),
            Value::Float(f) => KeyPart::Float(f.to_bits()),
            Value::Bool(b) => KeyPart::Bool(*b),
            Value::Int(i) => KeyPart::Int(*i),
            Value::String(s) => KeyPart::Text(s.clone()),
            Value::Timestamp(t) => KeyPart::Timestamp(*t),
            Value::Duration(d) => KeyPart::Duration(*d),
            Value::Json(j) => KeyPart::Json(j.to_string()),
        }
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    int_sum: i64,
    float_sum: f64,
    saw_float: bool,
    count: usize,
}

impl Accumulator {
    fn push_count(&mut self, value: &Value) {
        if !value.is_missing() {
            self.count += 1;
        }
    }

    /// Add a numeric value; `false` when the value is not numeric.
    fn push_number(&mut self, value: &Value) -> bool {
        match value {
            v if v.is_missing() => {}
            Value::Int(i) => self.int_sum = self.int_sum.wrapping_add(*i),
            Value::Bool(b) => self.int_sum = self.int_sum.wrapping_add(i64::from(*b)),
            Value::Float(f) => {
                self.float_sum += f;
                self.saw_float = true;
            }
            _ => return false,
        }
        if !value.is_missing() {
            self.count += 1;
        }
        true
    }

    /// `float_input` forces a float sum for groups whose floats were all missing.
    fn finish(&self, op: AggregateOp, float_input: bool) -> Value {
        match op {
            AggregateOp::Count => Value::Int(self.count as i64),
            AggregateOp::Sum if self.saw_float || float_input => Value::Float(self.total()),
            AggregateOp::Sum => Value::Int(self.int_sum),
            AggregateOp::Mean if self.count == 0 => Value::Null,
            AggregateOp::Mean => Value::Float(self.total() / self.count as f64),
        }
    }

    fn total(&self) -> f64 {
        self.int_sum as f64 + self.float_sum
    }
}

/// Compute `op` over `columns` per `group_by` group, one result per row.
pub fn broadcast(
    dataset: &Dataset,
    step: usize,
    op: AggregateOp,
    columns: &[String],
    group_by: &[String],
    output_column: &str,
) -> TransformResult<Vec<Value>> {
    if dataset.contains(output_column) {
        return Err(TransformError::ColumnExists {
            step,
            column: output_column.to_string(),
        });
    }

    let keys: Vec<&Column> = group_by
        .iter()
        .map(|name| dataset.require(name))
        .collect::<Result<_, _>>()?;
    let inputs: Vec<&Column> = columns
        .iter()
        .map(|name| dataset.require(name))
        .collect::<Result<_, _>>()?;
    let float_input = inputs
        .iter()
        .any(|c| c.values.iter().any(|v| matches!(v, Value::Float(_))));

    let row_keys: Vec<Vec<KeyPart>> = (0..dataset.row_count())
        .map(|row| keys.iter().map(|c| KeyPart::from(&c.values[row])).collect())
        .collect();

    let mut groups: HashMap<&[KeyPart], Accumulator> = HashMap::new();
    for (row, key) in row_keys.iter().enumerate() {
        let acc = groups.entry(key.as_slice()).or_default();
        for column in &inputs {
            let value = &column.values[row];
            if op == AggregateOp::Count {
                acc.push_count(value);
            } else if !acc.push_number(value) {
                return Err(TransformError::NonNumericAggregate {
                    step,
                    operation: op.as_str(),
                    column: column.name.clone(),
                    kind: value.type_name(),
                });
            }
        }
    }

    Ok(row_keys
        .iter()
        .map(|key| {
            groups
                .get(key.as_slice())
                .map_or(Value::Null, |acc| acc.finish(op, float_input))
        })
        .collect())
}
