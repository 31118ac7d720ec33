//! Row-wise evaluation of bound expressions.

use std::cmp::Ordering;

use crate::binder::{BoundExpression, BuiltinFunction};
use crate::compile::Arguments;
use crate::error::{FlowError, Result};
use crate::parser::ast::{BinaryOp, UnaryOp};
use crate::types::{DataType, Value};

/// Evaluates a bound expression for the current row.
///
/// Parameters are pulled from `arguments` only when reached, so the
/// right side of `&&`/`||` and the untaken arm of `?:` are never read.
///
/// # Errors
///
/// Returns `ExecutionError` on integer overflow, division or modulo by
/// zero, or a value whose runtime type disagrees with the bound type.
pub fn evaluate(expr: &BoundExpression, arguments: &mut dyn Arguments) -> Result<Value> {
    match expr {
        BoundExpression::Literal { value } => Ok(value.clone()),
        BoundExpression::Parameter { index, data_type } => {
            let value = arguments.value(*index)?;
            value.cast(*data_type).ok_or_else(|| {
                FlowError::ExecutionError(format!(
                    "parameter {index} expected {data_type}, got a value of another type"
                ))
            })
        }
        BoundExpression::Entry => i64::try_from(arguments.entry())
            .map(Value::Int64)
            .map_err(|_| FlowError::ExecutionError("entry number overflows INT64".to_string())),
        BoundExpression::Unary { op, operand, .. } => {
            let value = evaluate(operand, arguments)?;
            match (op, value) {
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnaryOp::Neg, Value::Int64(i)) => i
                    .checked_neg()
                    .map(Value::Int64)
                    .ok_or_else(|| overflow("-")),
                (UnaryOp::Neg, Value::Float64(f)) => Ok(Value::Float64(-f)),
                (_, v) => Err(mismatch("unary operand", &v)),
            }
        }
        BoundExpression::Logical { left, op, right } => {
            let lhs = as_bool(&evaluate(left, arguments)?)?;
            let short = match op {
                BinaryOp::And => !lhs,
                _ => lhs,
            };
            if short {
                return Ok(Value::Bool(lhs));
            }
            Ok(Value::Bool(as_bool(&evaluate(right, arguments)?)?))
        }
        BoundExpression::Comparison { left, op, right } => {
            let lhs = evaluate(left, arguments)?;
            let rhs = evaluate(right, arguments)?;
            Ok(Value::Bool(compare(&lhs, *op, &rhs)))
        }
        BoundExpression::Arithmetic {
            left,
            op,
            right,
            data_type,
        } => {
            let lhs = evaluate(left, arguments)?;
            let rhs = evaluate(right, arguments)?;
            arithmetic(lhs, *op, rhs, *data_type)
        }
        BoundExpression::Conditional {
            condition,
            then_branch,
            else_branch,
            data_type,
        } => {
            let taken = if as_bool(&evaluate(condition, arguments)?)? {
                then_branch
            } else {
                else_branch
            };
            let value = evaluate(taken, arguments)?;
            value
                .cast(*data_type)
                .ok_or_else(|| FlowError::ExecutionError(format!("conditional arm is not {data_type}")))
        }
        BoundExpression::Function {
            function,
            arguments: args,
            data_type,
        } => {
            let values = args
                .iter()
                .map(|a| evaluate(a, arguments))
                .collect::<Result<Vec<_>>>()?;
            call(*function, &values, *data_type)
        }
    }
}

fn as_bool(value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| mismatch("logical operand", value))
}

fn mismatch(context: &str, value: &Value) -> FlowError {
    FlowError::ExecutionError(format!(
        "{context} has unexpected type {}",
        value.data_type()
    ))
}

fn overflow(op: &str) -> FlowError {
    FlowError::ExecutionError(format!("integer overflow in '{op}'"))
}

/// Comparisons involving NaN are false, except `!=`.
fn compare(lhs: &Value, op: BinaryOp, rhs: &Value) -> bool {
    let Some(ordering) = lhs.compare(rhs) else {
        return op == BinaryOp::Neq;
    };
    match op {
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Lte => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Gte => ordering != Ordering::Less,
        BinaryOp::Eq => ordering == Ordering::Equal,
        _ => ordering != Ordering::Equal,
    }
}

fn arithmetic(lhs: Value, op: BinaryOp, rhs: Value, data_type: DataType) -> Result<Value> {
    if data_type == DataType::Int64 {
        let (Some(a), Some(b)) = (lhs.as_int64(), rhs.as_int64()) else {
            return Err(mismatch("integer operand", &lhs));
        };
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div | BinaryOp::Mod if b == 0 => {
                return Err(FlowError::ExecutionError(format!(
                    "integer {} by zero",
                    if op == BinaryOp::Div { "division" } else { "modulo" }
                )))
            }
            BinaryOp::Div => a.checked_div(b),
            BinaryOp::Mod => a.checked_rem(b),
            _ => None,
        };
        return result.map(Value::Int64).ok_or_else(|| overflow(op.as_str()));
    }

    let (Some(a), Some(b)) = (lhs.to_f64(), rhs.to_f64()) else {
        return Err(mismatch("numeric operand", &lhs));
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        _ => {
            return Err(FlowError::ExecutionError(format!(
                "'{op}' is not an arithmetic operator"
            )))
        }
    };
    Ok(Value::Float64(result))
}

fn call(function: BuiltinFunction, values: &[Value], data_type: DataType) -> Result<Value> {
    if data_type == DataType::Int64 {
        let ints = values
            .iter()
            .map(|v| v.as_int64().ok_or_else(|| mismatch(function.name(), v)))
            .collect::<Result<Vec<_>>>()?;
        let result = match (function, ints.as_slice()) {
            (BuiltinFunction::Abs, [a]) => a.checked_abs().ok_or_else(|| overflow("abs"))?,
            (BuiltinFunction::Min, [a, b]) => *a.min(b),
            (BuiltinFunction::Max, [a, b]) => *a.max(b),
            _ => {
                return Err(FlowError::ExecutionError(format!(
                    "{}() has no integer form",
                    function.name()
                )))
            }
        };
        return Ok(Value::Int64(result));
    }

    let floats = values
        .iter()
        .map(|v| v.to_f64().ok_or_else(|| mismatch(function.name(), v)))
        .collect::<Result<Vec<_>>>()?;
    let result = match (function, floats.as_slice()) {
        (BuiltinFunction::Abs, [a]) => a.abs(),
        (BuiltinFunction::Sqrt, [a]) => a.sqrt(),
        (BuiltinFunction::Exp, [a]) => a.exp(),
        (BuiltinFunction::Log, [a]) => a.ln(),
        (BuiltinFunction::Log10, [a]) => a.log10(),
        (BuiltinFunction::Floor, [a]) => a.floor(),
        (BuiltinFunction::Ceil, [a]) => a.ceil(),
        (BuiltinFunction::Round, [a]) => a.round(),
        (BuiltinFunction::Sin, [a]) => a.sin(),
        (BuiltinFunction::Cos, [a]) => a.cos(),
        (BuiltinFunction::Tan, [a]) => a.tan(),
        (BuiltinFunction::Pow, [a, b]) => a.powf(*b),
        (BuiltinFunction::Min, [a, b]) => a.min(*b),
        (BuiltinFunction::Max, [a, b]) => a.max(*b),
        (BuiltinFunction::Atan2, [a, b]) => a.atan2(*b),
        _ => {
            return Err(FlowError::ArityError {
                context: format!("{}()", function.name()),
                expected: function.arity(),
                actual: floats.len(),
            })
        }
    };
    Ok(Value::Float64(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{ExpressionCompiler, Interpreter};

    struct NoArgs;

    impl Arguments for NoArgs {
        fn value(&mut self, index: usize) -> Result<Value> {
            Err(FlowError::ExecutionError(format!("unexpected read of {index}")))
        }

        fn entry(&self) -> u64 {
            0
        }
    }

    fn eval(source: &str) -> Result<Value> {
        Interpreter.compile(source, &[])?.evaluate(&mut NoArgs)
    }

    #[test]
    fn test_integer_division_by_zero() {
        let err = eval("7 / 0").unwrap_err();
        assert!(matches!(err, FlowError::ExecutionError(ref m) if m.contains("division")));
        assert!(eval("7 % 0").is_err());
        assert_eq!(eval("7.0 / 0").unwrap(), Value::Float64(f64::INFINITY));
    }

    #[test]
    fn test_integer_overflow_is_reported() {
        assert!(eval("9223372036854775807 + 1").is_err());
    }

    #[test]
    fn test_nan_comparisons() {
        assert_eq!(eval("sqrt(-1.0) == sqrt(-1.0)").unwrap(), Value::Bool(false));
        assert_eq!(eval("sqrt(-1.0) != 1.0").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_conditional_casts_result() {
        assert_eq!(eval("1 > 0 ? 1 : 2.5").unwrap(), Value::Float64(1.0));
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("max(3, 9)").unwrap(), Value::Int64(9));
        assert_eq!(eval("abs(-2)").unwrap(), Value::Int64(2));
        assert_eq!(eval("pow(2, 10)").unwrap(), Value::Float64(1024.0));
    }

    #[test]
    fn test_string_equality() {
        assert_eq!(eval("\"a\" == \"a\"").unwrap(), Value::Bool(true));
        assert_eq!(eval("\"a\" < \"b\"").unwrap(), Value::Bool(true));
    }
}
