use std::cmp::Ordering;
use std::sync::Arc;

use super::error::{RuntimeError, RuntimeResult};
use super::format::percent_format;
use super::value::{check_len, Callable, Value};
use crate::ast::{BinaryOp, CompareOp, UnaryOp};

pub fn unary(op: UnaryOp, operand: &Value) -> RuntimeResult<Value> {
    match (op, operand) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.truthy())),
        (UnaryOp::Neg, Value::Float(value)) => Ok(Value::Float(-value)),
        (UnaryOp::Pos, Value::Float(value)) => Ok(Value::Float(*value)),
        (UnaryOp::Neg, value) if value.as_int().is_some() => value
            .as_int()
            .and_then(i64::checked_neg)
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::overflow("integer negation overflowed")),
        (UnaryOp::Pos, value) if value.as_int().is_some() => {
            Ok(Value::Int(value.as_int().unwrap_or_default()))
        }
        (op, value) => Err(RuntimeError::type_error(format!(
            "bad operand type for unary {}: '{}'",
            match op {
                UnaryOp::Neg => "-",
                UnaryOp::Pos => "+",
                UnaryOp::Not => "not",
            },
            value.type_name()
        ))),
    }
}

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> RuntimeResult<Value> {
    if let (Some(a), Some(b)) = (int_operand(left), int_operand(right)) {
        return int_binary(op, a, b);
    }
    if let (Some(a), Some(b)) = (left.as_float(), right.as_float()) {
        return float_binary(op, a, b);
    }

    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
            check_len(a.len().saturating_add(b.len()))?;
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Value::str(joined))
        }
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            check_len(a.read_recursive().len().saturating_add(b.read_recursive().len()))?;
            let mut items = a.read_recursive().clone();
            items.extend(b.read_recursive().iter().cloned());
            Ok(Value::list(items))
        }
        (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            check_len(a.len().saturating_add(b.len()))?;
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinaryOp::Mul, sequence, count) | (BinaryOp::Mul, count, sequence)
            if count.as_int().is_some()
                && matches!(sequence, Value::Str(_) | Value::List(_) | Value::Tuple(_)) =>
        {
            repeat(sequence, count.as_int().unwrap_or_default())
        }
        (BinaryOp::Sub, Value::Set(a), Value::Set(b)) => {
            let b = b.read_recursive();
            let kept = a
                .read_recursive()
                .iter()
                .filter(|(key, _)| !b.contains_key(*key))
                .map(|(_, value)| value.clone())
                .collect();
            Value::set(kept)
        }
        (BinaryOp::Mod, Value::Str(template), args) => {
            percent_format(template, args).map(Value::str)
        }
        (op, left, right) => Err(RuntimeError::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn int_operand(value: &Value) -> Option<i64> {
    match value {
        Value::Float(_) => None,
        other => other.as_int(),
    }
}

fn overflow(op: BinaryOp) -> RuntimeError {
    RuntimeError::overflow(format!("integer overflow in '{}'", op.symbol()))
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> RuntimeResult<Value> {
    let value = match op {
        BinaryOp::Add => a.checked_add(b).ok_or_else(|| overflow(op))?,
        BinaryOp::Sub => a.checked_sub(b).ok_or_else(|| overflow(op))?,
        BinaryOp::Mul => a.checked_mul(b).ok_or_else(|| overflow(op))?,
        BinaryOp::Div => {
            if b == 0 {
                return Err(RuntimeError::zero_division("division by zero"));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(RuntimeError::zero_division("integer division or modulo by zero"));
            }
            let quotient = a.checked_div(b).ok_or_else(|| overflow(op))?;
            if (a % b != 0) && ((a < 0) != (b < 0)) {
                quotient - 1
            } else {
                quotient
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(RuntimeError::zero_division("integer division or modulo by zero"));
            }
            let remainder = a.checked_rem(b).unwrap_or(0);
            if remainder != 0 && ((remainder < 0) != (b < 0)) {
                remainder + b
            } else {
                remainder
            }
        }
        BinaryOp::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(RuntimeError::zero_division(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            let exponent = u32::try_from(b).map_err(|_| overflow(op))?;
            a.checked_pow(exponent).ok_or_else(|| overflow(op))?
        }
    };
    Ok(Value::Int(value))
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> RuntimeResult<Value> {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(RuntimeError::zero_division("float division by zero"));
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return Err(RuntimeError::zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(RuntimeError::zero_division("float modulo"));
            }
            let remainder = a % b;
            if remainder != 0.0 && ((remainder < 0.0) != (b < 0.0)) {
                remainder + b
            } else {
                remainder
            }
        }
        BinaryOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(RuntimeError::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            if a < 0.0 && b.fract() != 0.0 {
                return Err(RuntimeError::value_error(
                    "negative number cannot be raised to a fractional power",
                ));
            }
            let result = a.powf(b);
            if result.is_infinite() && a.is_finite() && b.is_finite() {
                return Err(RuntimeError::overflow("numerical result out of range"));
            }
            result
        }
    };
    Ok(Value::Float(value))
}

fn repeat(sequence: &Value, count: i64) -> RuntimeResult<Value> {
    let count = usize::try_from(count.max(0)).unwrap_or(0);
    let unit = match sequence {
        Value::Str(text) => text.len(),
        Value::List(items) => items.read_recursive().len(),
        Value::Tuple(items) => items.len(),
        _ => 0,
    };
    check_len(unit.saturating_mul(count))?;
    match sequence {
        Value::Str(text) => Ok(Value::str(text.repeat(count))),
        Value::List(items) => {
            let items = items.read_recursive();
            Ok(Value::list(repeat_items(&items, count)))
        }
        Value::Tuple(items) => Ok(Value::tuple(repeat_items(items, count))),
        other => Err(RuntimeError::type_error(format!(
            "can't multiply sequence by '{}'",
            other.type_name()
        ))),
    }
}

fn repeat_items(items: &[Value], count: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    out
}

pub fn compare(op: CompareOp, left: &Value, right: &Value) -> RuntimeResult<bool> {
    let result = match op {
        CompareOp::Eq => left.py_eq(right),
        CompareOp::NotEq => !left.py_eq(right),
        CompareOp::Lt => left.py_cmp(right, "<")? == Ordering::Less,
        CompareOp::LtEq => left.py_cmp(right, "<=")? != Ordering::Greater,
        CompareOp::Gt => left.py_cmp(right, ">")? == Ordering::Greater,
        CompareOp::GtEq => left.py_cmp(right, ">=")? != Ordering::Less,
        CompareOp::In => contains(right, left)?,
        CompareOp::NotIn => !contains(right, left)?,
        CompareOp::Is => identical(left, right),
        CompareOp::IsNot => !identical(left, right),
    };
    Ok(result)
}

pub fn contains(container: &Value, item: &Value) -> RuntimeResult<bool> {
    match container {
        Value::Str(text) => match item {
            Value::Str(needle) => Ok(text.contains(needle.as_ref())),
            other => Err(RuntimeError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.read_recursive().iter().any(|x| x.py_eq(item))),
        Value::Tuple(items) => Ok(items.iter().any(|x| x.py_eq(item))),
        Value::Dict(dict) => dict.read_recursive().contains(item),
        Value::Set(set) => Ok(set.read_recursive().contains_key(&item.hash_key()?)),
        Value::Range { start, stop, step } => {
            let Some(value) = item.as_int() else {
                return Ok(false);
            };
            let in_bounds = if *step > 0 {
                value >= *start && value < *stop
            } else {
                value <= *start && value > *stop
            };
            Ok(in_bounds && (value - start) % step == 0)
        }
        other => Err(RuntimeError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => Arc::ptr_eq(a, b) || a == b,
        (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
        (Value::Dict(a), Value::Dict(b)) => Arc::ptr_eq(a, b),
        (Value::Set(a), Value::Set(b)) => Arc::ptr_eq(a, b),
        (Value::Record(a), Value::Record(b)) => Arc::ptr_eq(a, b),
        (Value::Tuple(a), Value::Tuple(b)) => Arc::ptr_eq(a, b),
        (Value::Callable(Callable::Builtin(a)), Value::Callable(Callable::Builtin(b))) => a == b,
        (Value::Callable(Callable::RecordType(a)), Value::Callable(Callable::RecordType(b))) => {
            Arc::ptr_eq(a, b)
        }
        (Value::Callable(Callable::Function(a)), Value::Callable(Callable::Function(b))) => {
            Arc::ptr_eq(a, b)
        }
        (Value::Module(a), Value::Module(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_division_and_modulo_round_toward_negative_infinity() {
        assert_eq!(binary(BinaryOp::FloorDiv, &Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(-4));
        assert_eq!(binary(BinaryOp::Mod, &Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(1));
        assert_eq!(binary(BinaryOp::Mod, &Value::Int(7), &Value::Int(-2)).unwrap(), Value::Int(-1));
        assert_eq!(
            binary(BinaryOp::Mod, &Value::Float(-1.5), &Value::Int(1)).unwrap(),
            Value::Float(0.5)
        );
    }

    #[test]
    fn true_division_always_yields_float() {
        let result = binary(BinaryOp::Div, &Value::Int(4), &Value::Int(2)).unwrap();
        assert!(matches!(result, Value::Float(f) if f == 2.0));
    }

    #[test]
    fn integer_overflow_is_reported() {
        let err = binary(BinaryOp::Mul, &Value::Int(i64::MAX), &Value::Int(2)).unwrap_err();
        assert_eq!(err.kind(), Some("OverflowError"));
    }

    #[test]
    fn division_by_zero_raises() {
        let err = binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)).unwrap_err();
        assert_eq!(err.kind(), Some("ZeroDivisionError"));
    }

    #[test]
    fn mixed_type_ordering_is_a_type_error() {
        let err = compare(CompareOp::Lt, &Value::str("a"), &Value::Int(1)).unwrap_err();
        assert_eq!(err.kind(), Some("TypeError"));
    }

    #[test]
    fn membership_covers_strings_and_ranges() {
        assert!(compare(CompareOp::In, &Value::str("ell"), &Value::str("hello")).unwrap());
        let range = Value::Range { start: 0, stop: 10, step: 3 };
        assert!(compare(CompareOp::In, &Value::Int(9), &range).unwrap());
        assert!(compare(CompareOp::NotIn, &Value::Int(8), &range).unwrap());
    }
}
