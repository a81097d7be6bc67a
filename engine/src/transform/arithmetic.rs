//! Element-wise arithmetic between two columns.

use chrono::TimeDelta;

use super::steps::ArithmeticOp;
use crate::error::{TransformError, TransformResult};
use crate::models::{duration_seconds, Dataset, Value};

/// Apply `op` row by row to `left` and `right`.
pub fn apply(
    dataset: &Dataset,
    step: usize,
    op: ArithmeticOp,
    left: &str,
    right: &str,
) -> TransformResult<Vec<Value>> {
    let lhs = &dataset.require(left)?.values;
    let rhs = &dataset.require(right)?.values;

    lhs.iter()
        .zip(rhs)
        .enumerate()
        .map(|(row, (a, b))| {
            combine(op, a, b).ok_or_else(|| TransformError::IncompatibleOperands {
                step,
                operation: op.as_str(),
                left: a.type_name(),
                right: b.type_name(),
                row,
            })
        })
        .collect()
}

/// Combine two cells, or `None` when the operand types have no defined result.
pub fn combine(op: ArithmeticOp, left: &Value, right: &Value) -> Option<Value> {
    use ArithmeticOp::*;
    use Value::*;

    if matches!(left, Null) || matches!(right, Null) {
        return Some(Null);
    }

    if let (Some(a), Some(b)) = (as_int(left), as_int(right)) {
        return Some(match op {
            Add => Int(a.wrapping_add(b)),
            Subtract => Int(a.wrapping_sub(b)),
            Multiply => Int(a.wrapping_mul(b)),
            Divide => Float(a as f64 / b as f64),
        });
    }

    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return Some(Float(match op {
            Add => a + b,
            Subtract => a - b,
            Multiply => a * b,
            Divide => a / b,
        }));
    }

    match (op, left, right) {
        (Subtract, Timestamp(a), Timestamp(b)) => Some(Duration(*a - *b)),
        (Add, Timestamp(t), Duration(d)) | (Add, Duration(d), Timestamp(t)) => {
            Some(t.checked_add_signed(*d).map_or(Null, Timestamp))
        }
        (Subtract, Timestamp(t), Duration(d)) => Some(t.checked_sub_signed(*d).map_or(Null, Timestamp)),
        (Add, Duration(a), Duration(b)) => Some(a.checked_add(b).map_or(Null, Duration)),
        (Subtract, Duration(a), Duration(b)) => Some(a.checked_sub(b).map_or(Null, Duration)),
        (Divide, Duration(a), Duration(b)) => Some(Float(duration_seconds(a) / duration_seconds(b))),
        (Multiply, Duration(d), n) | (Multiply, n, Duration(d)) => n.as_f64().map(|f| scale(d, f)),
        (Divide, Duration(d), n) => n.as_f64().map(|f| scale(d, 1.0 / f)),
        (Add, String(a), String(b)) => Some(String(format!("{a}{b}"))),
        _ => None,
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Scale a duration; results outside the representable range are missing.
fn scale(d: &TimeDelta, factor: f64) -> Value {
    let micros = duration_seconds(d) * 1_000_000.0 * factor;
    if micros.is_finite() && micros.abs() < i64::MAX as f64 {
        Value::Duration(TimeDelta::microseconds(micros.round() as i64))
    } else {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use serde_json::json;

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_int_arithmetic_stays_int() {
        assert_eq!(combine(ArithmeticOp::Add, &Value::Int(2), &Value::Int(3)), Some(Value::Int(5)));
        assert_eq!(combine(ArithmeticOp::Multiply, &Value::Int(4), &Value::Int(3)), Some(Value::Int(12)));
        assert_eq!(
            combine(ArithmeticOp::Add, &Value::Int(i64::MAX), &Value::Int(1)),
            Some(Value::Int(i64::MIN))
        );
    }

    #[test]
    fn test_divide_is_true_division() {
        assert_eq!(combine(ArithmeticOp::Divide, &Value::Int(7), &Value::Int(2)), Some(Value::Float(3.5)));
    }

    #[test]
    fn test_division_by_zero_yields_inf_and_nan() {
        let inf = combine(ArithmeticOp::Divide, &Value::Int(1), &Value::Int(0));
        assert_eq!(inf, Some(Value::Float(f64::INFINITY)));

        match combine(ArithmeticOp::Divide, &Value::Float(0.0), &Value::Int(0)) {
            Some(Value::Float(f)) => assert!(f.is_nan()),
            other => panic!("expected NaN, got {:?}", other),
        }
    }

    #[test]
    fn test_null_propagates() {
        assert_eq!(combine(ArithmeticOp::Add, &Value::Null, &Value::Int(1)), Some(Value::Null));
        assert_eq!(combine(ArithmeticOp::Divide, &Value::from("x"), &Value::Null), Some(Value::Null));
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let diff = combine(ArithmeticOp::Subtract, &Value::Timestamp(ts(12)), &Value::Timestamp(ts(9)));
        assert_eq!(diff, Some(Value::Duration(TimeDelta::hours(3))));

        let shifted = combine(ArithmeticOp::Add, &Value::Timestamp(ts(9)), &Value::Duration(TimeDelta::hours(3)));
        assert_eq!(shifted, Some(Value::Timestamp(ts(12))));

        let hours = combine(
            ArithmeticOp::Divide,
            &Value::Duration(TimeDelta::hours(3)),
            &Value::Duration(TimeDelta::hours(1)),
        );
        assert_eq!(hours, Some(Value::Float(3.0)));

        let half = combine(ArithmeticOp::Divide, &Value::Duration(TimeDelta::hours(3)), &Value::Int(2));
        assert_eq!(half, Some(Value::Duration(TimeDelta::minutes(90))));
    }

    #[test]
    fn test_string_concatenation_and_incompatible() {
        assert_eq!(
            combine(ArithmeticOp::Add, &Value::from("ab"), &Value::from("cd")),
            Some(Value::from("abcd"))
        );
        assert_eq!(combine(ArithmeticOp::Multiply, &Value::from("ab"), &Value::Int(2)), None);
        assert_eq!(combine(ArithmeticOp::Add, &Value::Timestamp(ts(1)), &Value::Timestamp(ts(2))), None);
    }

    #[test]
    fn test_apply_division_by_zero_affects_only_that_row() {
        let ds = Dataset::from_records(&[
            json!({"a": 10, "b": 2}).as_object().unwrap().clone(),
            json!({"a": 1, "b": 0}).as_object().unwrap().clone(),
            json!({"a": 9, "b": 3}).as_object().unwrap().clone(),
        ]);

        let out = apply(&ds, 0, ArithmeticOp::Divide, "a", "b").unwrap();

        assert_eq!(out, vec![Value::Float(5.0), Value::Float(f64::INFINITY), Value::Float(3.0)]);
    }

    #[test]
    fn test_apply_reports_row_and_types() {
        let ds = Dataset::from_records(&[
            json!({"a": 1, "b": 1}).as_object().unwrap().clone(),
            json!({"a": 1, "b": "x"}).as_object().unwrap().clone(),
        ]);

        let err = apply(&ds, 4, ArithmeticOp::Subtract, "a", "b").unwrap_err();

        assert!(matches!(
            err,
            TransformError::IncompatibleOperands { step: 4, row: 1, left: "int", right: "string", .. }
        ));
    }

    #[test]
    fn test_apply_missing_column() {
        let ds = Dataset::from_records(&[json!({"a": 1}).as_object().unwrap().clone()]);
        assert!(matches!(
            apply(&ds, 0, ArithmeticOp::Add, "a", "nope"),
            Err(TransformError::Dataset(_))
        ));
    }
}
