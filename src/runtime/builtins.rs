use std::cmp::Ordering;

use tracing::info;

use super::error::{RuntimeError, RuntimeResult};
use super::format::apply_format_spec;
use super::interpreter::Interpreter;
use super::ops;
use super::value::{Callable, Dict, Module, Value};
use crate::ast::BinaryOp;

pub const FUNCTIONS: &[&str] = &[
    "abs", "all", "any", "bin", "bool", "chr", "dict", "divmod", "enumerate", "filter", "float",
    "format", "hex", "int", "isinstance", "len", "list", "map", "max", "min", "ord", "pow",
    "print", "range", "repr", "reversed", "round", "set", "sorted", "str", "sum", "tuple", "zip",
];

pub const EXCEPTIONS: &[&str] = &[
    "ArithmeticError",
    "AssertionError",
    "Exception",
    "IndexError",
    "KeyError",
    "LookupError",
    "MemoryError",
    "NotImplementedError",
    "OverflowError",
    "RuntimeError",
    "TypeError",
    "ValueError",
    "ZeroDivisionError",
];

const MATH_FUNCTIONS: &[&str] = &[
    "math.acos", "math.asin", "math.atan", "math.atan2", "math.ceil", "math.comb", "math.cos",
    "math.degrees", "math.exp", "math.fabs", "math.factorial", "math.floor", "math.fsum",
    "math.gcd", "math.hypot", "math.isclose", "math.isfinite", "math.isinf", "math.isnan",
    "math.isqrt", "math.lcm", "math.log", "math.log10", "math.log2", "math.pow", "math.prod",
    "math.radians", "math.sin", "math.sqrt", "math.tan", "math.trunc",
];

/// Every name resolvable without an import.
pub fn names() -> impl Iterator<Item = &'static str> {
    FUNCTIONS.iter().chain(EXCEPTIONS).copied()
}

pub fn lookup(name: &str) -> Option<Value> {
    names()
        .find(|candidate| *candidate == name)
        .map(|name| Value::Callable(Callable::Builtin(name)))
}

pub fn is_exception(name: &str) -> bool {
    EXCEPTIONS.contains(&name)
}

pub fn module_member(module: Module, name: &str) -> Option<Value> {
    match module {
        Module::Math => math_member(name),
    }
}

pub fn math_member(name: &str) -> Option<Value> {
    let constant = match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        "tau" => Some(std::f64::consts::TAU),
        "inf" => Some(f64::INFINITY),
        "nan" => Some(f64::NAN),
        _ => None,
    };
    if let Some(value) = constant {
        return Some(Value::Float(value));
    }
    MATH_FUNCTIONS
        .iter()
        .find(|qualified| qualified.strip_prefix("math.") == Some(name))
        .map(|qualified| Value::Callable(Callable::Builtin(qualified)))
}

pub fn math_member_names() -> impl Iterator<Item = &'static str> {
    ["pi", "e", "tau", "inf", "nan"]
        .into_iter()
        .chain(MATH_FUNCTIONS.iter().filter_map(|name| name.strip_prefix("math.")))
}

/// Positional and keyword arguments of a native call, consumed as they are read.
pub(super) struct CallArgs {
    pub(super) name: String,
    pub(super) args: Vec<Value>,
    pub(super) kwargs: Vec<(String, Value)>,
}

impl CallArgs {
    pub(super) fn new(name: impl Into<String>, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Self {
        Self {
            name: name.into(),
            args,
            kwargs,
        }
    }

    pub(super) fn kwarg(&mut self, key: &str) -> Option<Value> {
        let index = self.kwargs.iter().position(|(name, _)| name == key)?;
        Some(self.kwargs.remove(index).1)
    }

    pub(super) fn no_kwargs(&self) -> RuntimeResult<()> {
        match self.kwargs.first() {
            Some((key, _)) => Err(RuntimeError::type_error(format!(
                "{}() got an unexpected keyword argument '{key}'",
                self.name
            ))),
            None => Ok(()),
        }
    }

    pub(super) fn arity(&self, min: usize, max: usize) -> RuntimeResult<()> {
        let count = self.args.len();
        if count < min || count > max {
            let expected = if min == max {
                format!("exactly {min}")
            } else if count < min {
                format!("at least {min}")
            } else {
                format!("at most {max}")
            };
            return Err(RuntimeError::type_error(format!(
                "{}() takes {expected} argument(s) ({count} given)",
                self.name
            )));
        }
        Ok(())
    }

    pub(super) fn int(&self, index: usize) -> RuntimeResult<i64> {
        let value = &self.args[index];
        value.as_int().ok_or_else(|| {
            RuntimeError::type_error(format!(
                "{}() expected an integer, got '{}'",
                self.name,
                value.type_name()
            ))
        })
    }

    pub(super) fn float(&self, index: usize) -> RuntimeResult<f64> {
        let value = &self.args[index];
        value.as_float().ok_or_else(|| {
            RuntimeError::type_error(format!(
                "must be real number, not {}",
                value.type_name()
            ))
        })
    }
}

pub fn call(
    interp: &mut Interpreter<'_>,
    name: &'static str,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> RuntimeResult<Value> {
    let mut call = CallArgs::new(name, args, kwargs);

    if is_exception(name) {
        call.no_kwargs()?;
        let message = match call.args.as_slice() {
            [] => String::new(),
            [single] => single.to_display(),
            many => Value::tuple(many.to_vec()).repr(),
        };
        return Ok(Value::exception(name, message));
    }
    if let Some(function) = name.strip_prefix("math.") {
        return call_math(interp, function, call);
    }

    match name {
        "abs" => {
            call.no_kwargs()?;
            call.arity(1, 1)?;
            match &call.args[0] {
                Value::Float(value) => Ok(Value::Float(value.abs())),
                value => value
                    .as_int()
                    .ok_or_else(|| {
                        RuntimeError::type_error(format!(
                            "bad operand type for abs(): '{}'",
                            value.type_name()
                        ))
                    })?
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| RuntimeError::overflow("integer overflow in abs()")),
            }
        }
        "all" | "any" => {
            call.no_kwargs()?;
            call.arity(1, 1)?;
            let want_all = name == "all";
            for item in call.args[0].iter()? {
                interp.tick()?;
                if item.truthy() != want_all {
                    return Ok(Value::Bool(!want_all));
                }
            }
            Ok(Value::Bool(want_all))
        }
        "bin" | "hex" => {
            call.no_kwargs()?;
            call.arity(1, 1)?;
            let value = call.int(0)?;
            let digits = if name == "bin" {
                format!("0b{:b}", value.unsigned_abs())
            } else {
                format!("0x{:x}", value.unsigned_abs())
            };
            Ok(Value::str(if value < 0 { format!("-{digits}") } else { digits }))
        }
        "bool" => {
            call.no_kwargs()?;
            call.arity(0, 1)?;
            Ok(Value::Bool(call.args.first().is_some_and(Value::truthy)))
        }
        "chr" => {
            call.no_kwargs()?;
            call.arity(1, 1)?;
            let code = call.int(0)?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|ch| Value::str(ch.to_string()))
                .ok_or_else(|| RuntimeError::value_error("chr() arg not in range(0x110000)"))
        }
        "dict" => {
            call.arity(0, 1)?;
            let mut dict = Dict::new();
            if let Some(source) = call.args.first() {
                match source {
                    Value::Dict(other) => {
                        for (key, value) in other.read_recursive().items() {
                            dict.insert(key, value)?;
                        }
                    }
                    iterable => {
                        for item in iterable.iter()? {
                            let (key, value) = pair(&item)?;
                            dict.insert(key, value)?;
                        }
                    }
                }
            }
            for (key, value) in call.kwargs.drain(..) {
                dict.insert(Value::str(key), value)?;
            }
            Ok(Value::dict(dict))
        }
        "divmod" => {
            call.no_kwargs()?;
            call.arity(2, 2)?;
            let quotient = ops::binary(BinaryOp::FloorDiv, &call.args[0], &call.args[1])?;
            let remainder = ops::binary(BinaryOp::Mod, &call.args[0], &call.args[1])?;
            Ok(Value::tuple(vec![quotient, remainder]))
        }
        "enumerate" => {
            let start = call.kwarg("start");
            call.no_kwargs()?;
            call.arity(1, 2)?;
            let start = match (start.as_ref(), call.args.get(1)) {
                (Some(value), _) | (None, Some(value)) => value.as_int().unwrap_or(0),
                (None, None) => 0,
            };
            let mut counter = start;
            let mut out = Vec::new();
            for item in call.args[0].iter()? {
                interp.tick()?;
                out.push(Value::tuple(vec![Value::Int(counter), item]));
                counter += 1;
            }
            Ok(Value::list(out))
        }
        "filter" => {
            call.no_kwargs()?;
            call.arity(2, 2)?;
            let predicate = call.args[0].clone();
            let mut out = Vec::new();
            for item in call.args[1].iter()? {
                interp.tick()?;
                let keep = if predicate.is_none() {
                    item.truthy()
                } else {
                    interp.call_value(&predicate, vec![item.clone()], Vec::new())?.truthy()
                };
                if keep {
                    out.push(item);
                }
            }
            Ok(Value::list(out))
        }
        "float" => {
            call.no_kwargs()?;
            call.arity(0, 1)?;
            match call.args.first() {
                None => Ok(Value::Float(0.0)),
                Some(Value::Str(text)) => parse_float(text).map(Value::Float),
                Some(value) => value.as_float().map(Value::Float).ok_or_else(|| {
                    RuntimeError::type_error(format!(
                        "float() argument must be a string or a real number, not '{}'",
                        value.type_name()
                    ))
                }),
            }
        }
        "format" => {
            call.no_kwargs()?;
            call.arity(1, 2)?;
            let spec = call.args.get(1).map(Value::to_display).unwrap_or_default();
            apply_format_spec(&call.args[0], &spec).map(Value::str)
        }
        "int" => {
            let base = call.kwarg("base");
            call.no_kwargs()?;
            call.arity(0, 2)?;
            let base = match (base.as_ref(), call.args.get(1)) {
                (Some(value), _) | (None, Some(value)) => value.as_int(),
                (None, None) => None,
            };
            match call.args.first() {
                None => Ok(Value::Int(0)),
                Some(Value::Str(text)) => parse_int(text, base.unwrap_or(10)).map(Value::Int),
                Some(Value::Float(value)) => float_to_int(*value).map(Value::Int),
                Some(value) => value.as_int().map(Value::Int).ok_or_else(|| {
                    RuntimeError::type_error(format!(
                        "int() argument must be a string or a number, not '{}'",
                        value.type_name()
                    ))
                }),
            }
        }
        "isinstance" => {
            call.no_kwargs()?;
            call.arity(2, 2)?;
            is_instance(&call.args[0], &call.args[1]).map(Value::Bool)
        }
        "len" => {
            call.no_kwargs()?;
            call.arity(1, 1)?;
            let len = call.args[0].len()?;
            Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
        }
        "list" => {
            call.no_kwargs()?;
            call.arity(0, 1)?;
            match call.args.first() {
                Some(iterable) => Ok(Value::list(iterable.to_vec()?)),
                None => Ok(Value::list(Vec::new())),
            }
        }
        "map" => {
            call.no_kwargs()?;
            call.arity(2, usize::MAX)?;
            let function = call.args[0].clone();
            let columns = call.args[1..]
                .iter()
                .map(Value::to_vec)
                .collect::<RuntimeResult<Vec<_>>>()?;
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            let mut out = Vec::with_capacity(rows);
            for row in 0..rows {
                interp.tick()?;
                let args = columns.iter().map(|column| column[row].clone()).collect();
                out.push(interp.call_value(&function, args, Vec::new())?);
            }
            Ok(Value::list(out))
        }
        "max" | "min" => {
            let key = call.kwarg("key").filter(|key| !key.is_none());
            let default = call.kwarg("default");
            call.no_kwargs()?;
            call.arity(1, usize::MAX)?;
            let items = if call.args.len() == 1 {
                call.args[0].to_vec()?
            } else {
                std::mem::take(&mut call.args)
            };
            let wanted = if name == "max" {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            let mut best: Option<(Value, Value)> = None;
            for item in items {
                interp.tick()?;
                let rank = match &key {
                    Some(key) => interp.call_value(key, vec![item.clone()], Vec::new())?,
                    None => item.clone(),
                };
                let replace = match &best {
                    None => true,
                    Some((best_rank, _)) => rank.py_cmp(best_rank, "<")? == wanted,
                };
                if replace {
                    best = Some((rank, item));
                }
            }
            match (best, default) {
                (Some((_, item)), _) => Ok(item),
                (None, Some(default)) => Ok(default),
                (None, None) => Err(RuntimeError::value_error(format!(
                    "{name}() arg is an empty sequence"
                ))),
            }
        }
        "ord" => {
            call.no_kwargs()?;
            call.arity(1, 1)?;
            let text = call.args[0].as_str().unwrap_or_default();
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Ok(Value::Int(i64::from(u32::from(ch)))),
                _ => Err(RuntimeError::type_error(
                    "ord() expected a character",
                )),
            }
        }
        "pow" => {
            call.no_kwargs()?;
            call.arity(2, 3)?;
            if call.args.len() == 3 {
                let (base, exponent, modulus) = (call.int(0)?, call.int(1)?, call.int(2)?);
                return modular_pow(base, exponent, modulus).map(Value::Int);
            }
            ops::binary(BinaryOp::Pow, &call.args[0], &call.args[1])
        }
        "print" => {
            let sep = call.kwarg("sep").map(|v| v.to_display()).unwrap_or_else(|| " ".into());
            let _ = call.kwarg("end");
            call.no_kwargs()?;
            let line = call
                .args
                .iter()
                .map(Value::to_display)
                .collect::<Vec<_>>()
                .join(&sep);
            info!(target: "conjure::print", "{line}");
            Ok(Value::None)
        }
        "range" => {
            call.no_kwargs()?;
            call.arity(1, 3)?;
            let (start, stop, step) = match call.args.len() {
                1 => (0, call.int(0)?, 1),
                2 => (call.int(0)?, call.int(1)?, 1),
                _ => (call.int(0)?, call.int(1)?, call.int(2)?),
            };
            if step == 0 {
                return Err(RuntimeError::value_error("range() arg 3 must not be zero"));
            }
            Ok(Value::Range { start, stop, step })
        }
        "repr" => {
            call.no_kwargs()?;
            call.arity(1, 1)?;
            Ok(Value::str(call.args[0].repr()))
        }
        "reversed" => {
            call.no_kwargs()?;
            call.arity(1, 1)?;
            let mut items = call.args[0].to_vec()?;
            items.reverse();
            Ok(Value::list(items))
        }
        "round" => {
            let digits = call.kwarg("ndigits");
            call.no_kwargs()?;
            call.arity(1, 2)?;
            let digits = digits.or_else(|| call.args.get(1).cloned());
            round(&call.args[0], digits.as_ref())
        }
        "set" => {
            call.no_kwargs()?;
            call.arity(0, 1)?;
            match call.args.first() {
                Some(iterable) => Value::set(iterable.to_vec()?),
                None => Value::set(Vec::new()),
            }
        }
        "sorted" => {
            let key = call.kwarg("key").filter(|key| !key.is_none());
            let reverse = call.kwarg("reverse").is_some_and(|value| value.truthy());
            call.no_kwargs()?;
            call.arity(1, 1)?;
            let items = call.args[0].to_vec()?;
            sort_values(interp, items, key.as_ref(), reverse).map(Value::list)
        }
        "str" => {
            call.no_kwargs()?;
            call.arity(0, 1)?;
            Ok(Value::str(
                call.args.first().map(Value::to_display).unwrap_or_default(),
            ))
        }
        "sum" => {
            let start = call.kwarg("start");
            call.no_kwargs()?;
            call.arity(1, 2)?;
            let mut total = start
                .or_else(|| call.args.get(1).cloned())
                .unwrap_or(Value::Int(0));
            for item in call.args[0].iter()? {
                interp.tick()?;
                total = ops::binary(BinaryOp::Add, &total, &item)?;
            }
            Ok(total)
        }
        "tuple" => {
            call.no_kwargs()?;
            call.arity(0, 1)?;
            match call.args.first() {
                Some(iterable) => Ok(Value::tuple(iterable.to_vec()?)),
                None => Ok(Value::tuple(Vec::new())),
            }
        }
        "zip" => {
            let _ = call.kwarg("strict");
            call.no_kwargs()?;
            let columns = call
                .args
                .iter()
                .map(Value::to_vec)
                .collect::<RuntimeResult<Vec<_>>>()?;
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            Ok(Value::list(
                (0..rows)
                    .map(|row| Value::tuple(columns.iter().map(|c| c[row].clone()).collect()))
                    .collect(),
            ))
        }
        other => Err(RuntimeError::name_error(other)),
    }
}

fn pair(item: &Value) -> RuntimeResult<(Value, Value)> {
    let items = item.to_vec()?;
    match <[Value; 2]>::try_from(items) {
        Ok([key, value]) => Ok((key, value)),
        Err(items) => Err(RuntimeError::value_error(format!(
            "dictionary update sequence element has length {}; 2 is required",
            items.len()
        ))),
    }
}

fn parse_int(text: &str, base: i64) -> RuntimeResult<i64> {
    let cleaned = text.trim().replace('_', "");
    let invalid =
        || RuntimeError::value_error(format!("invalid literal for int() with base {base}: {}", Value::str(text).repr()));
    let radix = u32::try_from(base).map_err(|_| invalid())?;
    if !(2..=36).contains(&radix) {
        return Err(RuntimeError::value_error("int() base must be >= 2 and <= 36"));
    }
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let digits = match radix {
        16 => digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")).unwrap_or(digits),
        2 => digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")).unwrap_or(digits),
        8 => digits.strip_prefix("0o").or_else(|| digits.strip_prefix("0O")).unwrap_or(digits),
        _ => digits,
    };
    if digits.is_empty() {
        return Err(invalid());
    }
    let magnitude = i64::from_str_radix(digits, radix).map_err(|_| invalid())?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn parse_float(text: &str) -> RuntimeResult<f64> {
    let cleaned = text.trim().replace('_', "");
    cleaned.parse::<f64>().map_err(|_| {
        RuntimeError::value_error(format!(
            "could not convert string to float: {}",
            Value::str(text).repr()
        ))
    })
}

fn float_to_int(value: f64) -> RuntimeResult<i64> {
    if value.is_nan() {
        return Err(RuntimeError::value_error("cannot convert float NaN to integer"));
    }
    let truncated = value.trunc();
    if truncated.is_infinite() || truncated.abs() >= 9.223_372_036_854_776e18 {
        return Err(RuntimeError::overflow("cannot convert float to a 64-bit integer"));
    }
    Ok(truncated as i64)
}

fn round(value: &Value, digits: Option<&Value>) -> RuntimeResult<Value> {
    let digits = match digits {
        None | Some(Value::None) => None,
        Some(other) => Some(other.as_int().ok_or_else(|| {
            RuntimeError::type_error("ndigits must be an integer")
        })?),
    };

    match (value, digits) {
        (Value::Float(number), None) => float_to_int(number.round_ties_even()).map(Value::Int),
        (Value::Float(number), Some(digits)) if digits >= 0 => {
            if !number.is_finite() {
                return Ok(Value::Float(*number));
            }
            let digits = usize::try_from(digits.min(300)).unwrap_or(300);
            let rendered = format!("{number:.digits$}");
            Ok(Value::Float(rendered.parse().unwrap_or(*number)))
        }
        (Value::Float(number), Some(digits)) => {
            let scale = 10f64.powi(i32::try_from(-digits).unwrap_or(i32::MAX));
            Ok(Value::Float((number / scale).round_ties_even() * scale))
        }
        (other, digits) => {
            let number = other.as_int().ok_or_else(|| {
                RuntimeError::type_error(format!(
                    "type {} doesn't define __round__ method",
                    other.type_name()
                ))
            })?;
            match digits {
                Some(digits) if digits < 0 => {
                    let exponent = u32::try_from(-digits).unwrap_or(u32::MAX);
                    let Some(scale) = 10i64.checked_pow(exponent) else {
                        return Ok(Value::Int(0));
                    };
                    let quotient = (number as f64 / scale as f64).round_ties_even() as i64;
                    quotient
                        .checked_mul(scale)
                        .map(Value::Int)
                        .ok_or_else(|| RuntimeError::overflow("integer overflow in round()"))
                }
                _ => Ok(Value::Int(number)),
            }
        }
    }
}

fn modular_pow(base: i64, exponent: i64, modulus: i64) -> RuntimeResult<i64> {
    if modulus == 0 {
        return Err(RuntimeError::value_error("pow() 3rd argument cannot be 0"));
    }
    if exponent < 0 {
        return Err(RuntimeError::value_error(
            "pow() negative exponent with modulus is not supported",
        ));
    }
    let modulus = i128::from(modulus);
    let mut result: i128 = 1;
    let mut base = i128::from(base).rem_euclid(modulus);
    let mut exponent = exponent;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = (result * base).rem_euclid(modulus);
        }
        base = (base * base).rem_euclid(modulus);
        exponent >>= 1;
    }
    let result = if modulus < 0 && result > 0 { result + modulus } else { result };
    i64::try_from(result).map_err(|_| RuntimeError::overflow("pow() result out of range"))
}

fn is_instance(value: &Value, class: &Value) -> RuntimeResult<bool> {
    match class {
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if is_instance(value, class)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Callable(Callable::RecordType(schema)) => Ok(matches!(
            value,
            Value::Record(record) if record.read_recursive().schema.name == schema.name
        )),
        Value::Callable(Callable::Builtin(name)) if is_exception(name) => Ok(matches!(
            value,
            Value::Exception(exception) if *name == "Exception" || exception.kind == *name
        )),
        Value::Callable(Callable::Builtin(name)) => {
            let matched = match *name {
                "int" => matches!(value, Value::Int(_) | Value::Bool(_)),
                "float" => matches!(value, Value::Float(_)),
                "str" => matches!(value, Value::Str(_)),
                "bool" => matches!(value, Value::Bool(_)),
                "list" => matches!(value, Value::List(_)),
                "tuple" => matches!(value, Value::Tuple(_)),
                "dict" => matches!(value, Value::Dict(_)),
                "set" => matches!(value, Value::Set(_)),
                "range" => matches!(value, Value::Range { .. }),
                other => {
                    return Err(RuntimeError::type_error(format!(
                        "isinstance() arg 2 must be a type, not builtin '{other}'"
                    )));
                }
            };
            Ok(matched)
        }
        other => Err(RuntimeError::type_error(format!(
            "isinstance() arg 2 must be a type or tuple of types, not '{}'",
            other.type_name()
        ))),
    }
}

/// Stable sort with optional key function, shared by `sorted` and `list.sort`.
pub(crate) fn sort_values(
    interp: &mut Interpreter<'_>,
    items: Vec<Value>,
    key: Option<&Value>,
    reverse: bool,
) -> RuntimeResult<Vec<Value>> {
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        interp.tick()?;
        let rank = match key {
            Some(key) => interp.call_value(key, vec![item.clone()], Vec::new())?,
            None => item.clone(),
        };
        keyed.push((rank, item));
    }

    let mut failure = None;
    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = match a.py_cmp(b, "<") {
            Ok(ordering) => ordering,
            Err(err) => {
                failure.get_or_insert(err);
                Ordering::Equal
            }
        };
        if reverse { ordering.reverse() } else { ordering }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(keyed.into_iter().map(|(_, item)| item).collect()),
    }
}

fn domain_error() -> RuntimeError {
    RuntimeError::value_error("math domain error")
}

fn call_math(interp: &mut Interpreter<'_>, function: &str, mut call: CallArgs) -> RuntimeResult<Value> {
    let unary = |call: &CallArgs, op: fn(f64) -> f64| -> RuntimeResult<Value> {
        call.no_kwargs()?;
        call.arity(1, 1)?;
        Ok(Value::Float(op(call.float(0)?)))
    };

    match function {
        "sqrt" => {
            call.arity(1, 1)?;
            let x = call.float(0)?;
            if x < 0.0 {
                return Err(domain_error());
            }
            Ok(Value::Float(x.sqrt()))
        }
        "isqrt" => {
            call.arity(1, 1)?;
            let n = call.int(0)?;
            if n < 0 {
                return Err(RuntimeError::value_error("isqrt() argument must be nonnegative"));
            }
            let mut root = (n as f64).sqrt() as i64;
            while root.checked_mul(root).is_none_or(|square| square > n) {
                root -= 1;
            }
            while (root + 1).checked_mul(root + 1).is_some_and(|square| square <= n) {
                root += 1;
            }
            Ok(Value::Int(root))
        }
        "floor" | "ceil" | "trunc" => {
            call.arity(1, 1)?;
            if let Value::Int(_) | Value::Bool(_) = call.args[0] {
                return Ok(Value::Int(call.int(0)?));
            }
            let x = call.float(0)?;
            let rounded = match function {
                "floor" => x.floor(),
                "ceil" => x.ceil(),
                _ => x.trunc(),
            };
            float_to_int(rounded).map(Value::Int)
        }
        "log" => {
            call.arity(1, 2)?;
            let x = call.float(0)?;
            if x <= 0.0 {
                return Err(domain_error());
            }
            match call.args.len() {
                1 => Ok(Value::Float(x.ln())),
                _ => {
                    let base = call.float(1)?;
                    if base <= 0.0 || base == 1.0 {
                        return Err(domain_error());
                    }
                    Ok(Value::Float(x.ln() / base.ln()))
                }
            }
        }
        "log2" | "log10" => {
            call.arity(1, 1)?;
            let x = call.float(0)?;
            if x <= 0.0 {
                return Err(domain_error());
            }
            Ok(Value::Float(if function == "log2" { x.log2() } else { x.log10() }))
        }
        "exp" => {
            call.arity(1, 1)?;
            let result = call.float(0)?.exp();
            if result.is_infinite() {
                return Err(RuntimeError::overflow("math range error"));
            }
            Ok(Value::Float(result))
        }
        "pow" => {
            call.arity(2, 2)?;
            Ok(Value::Float(call.float(0)?.powf(call.float(1)?)))
        }
        "fabs" => unary(&call, f64::abs),
        "sin" => unary(&call, f64::sin),
        "cos" => unary(&call, f64::cos),
        "tan" => unary(&call, f64::tan),
        "atan" => unary(&call, f64::atan),
        "degrees" => unary(&call, f64::to_degrees),
        "radians" => unary(&call, f64::to_radians),
        "asin" | "acos" => {
            call.arity(1, 1)?;
            let x = call.float(0)?;
            if !(-1.0..=1.0).contains(&x) {
                return Err(domain_error());
            }
            Ok(Value::Float(if function == "asin" { x.asin() } else { x.acos() }))
        }
        "atan2" => {
            call.arity(2, 2)?;
            Ok(Value::Float(call.float(0)?.atan2(call.float(1)?)))
        }
        "hypot" => {
            let mut total = 0.0f64;
            for index in 0..call.args.len() {
                let x = call.float(index)?;
                total += x * x;
            }
            Ok(Value::Float(total.sqrt()))
        }
        "isnan" | "isinf" | "isfinite" => {
            call.arity(1, 1)?;
            let x = call.float(0)?;
            Ok(Value::Bool(match function {
                "isnan" => x.is_nan(),
                "isinf" => x.is_infinite(),
                _ => x.is_finite(),
            }))
        }
        "isclose" => {
            let rel_tol = call.kwarg("rel_tol").and_then(|v| v.as_float()).unwrap_or(1e-9);
            let abs_tol = call.kwarg("abs_tol").and_then(|v| v.as_float()).unwrap_or(0.0);
            call.no_kwargs()?;
            call.arity(2, 2)?;
            let (a, b) = (call.float(0)?, call.float(1)?);
            if a == b {
                return Ok(Value::Bool(true));
            }
            let diff = (a - b).abs();
            Ok(Value::Bool(
                diff <= (rel_tol * b.abs()).max(rel_tol * a.abs()) || diff <= abs_tol,
            ))
        }
        "factorial" => {
            call.arity(1, 1)?;
            let n = call.int(0)?;
            if n < 0 {
                return Err(RuntimeError::value_error(
                    "factorial() not defined for negative values",
                ));
            }
            let mut result: i64 = 1;
            for k in 2..=n {
                interp.tick()?;
                result = result
                    .checked_mul(k)
                    .ok_or_else(|| RuntimeError::overflow("factorial() result too large"))?;
            }
            Ok(Value::Int(result))
        }
        "comb" => {
            call.arity(2, 2)?;
            let (n, k) = (call.int(0)?, call.int(1)?);
            if n < 0 || k < 0 {
                return Err(RuntimeError::value_error("must be a non-negative integer"));
            }
            if k > n {
                return Ok(Value::Int(0));
            }
            let k = k.min(n - k);
            let mut result: i128 = 1;
            for i in 0..k {
                result = result * i128::from(n - i) / i128::from(i + 1);
            }
            i64::try_from(result)
                .map(Value::Int)
                .map_err(|_| RuntimeError::overflow("comb() result too large"))
        }
        "gcd" | "lcm" => {
            let mut acc: i64 = if function == "gcd" { 0 } else { 1 };
            for index in 0..call.args.len() {
                let value = call.int(index)?.checked_abs().unwrap_or(i64::MAX);
                acc = if function == "gcd" {
                    gcd(acc, value)
                } else if acc == 0 || value == 0 {
                    0
                } else {
                    (acc / gcd(acc, value))
                        .checked_mul(value)
                        .ok_or_else(|| RuntimeError::overflow("lcm() result too large"))?
                };
            }
            Ok(Value::Int(acc))
        }
        "fsum" => {
            call.arity(1, 1)?;
            let mut total = 0.0;
            for item in call.args[0].iter()? {
                total += item.as_float().ok_or_else(|| {
                    RuntimeError::type_error(format!("must be real number, not {}", item.type_name()))
                })?;
            }
            Ok(Value::Float(total))
        }
        "prod" => {
            let start = call.kwarg("start").unwrap_or(Value::Int(1));
            call.no_kwargs()?;
            call.arity(1, 1)?;
            let mut total = start;
            for item in call.args[0].iter()? {
                interp.tick()?;
                total = ops::binary(BinaryOp::Mul, &total, &item)?;
            }
            Ok(total)
        }
        other => Err(RuntimeError::attribute_error(format!(
            "module 'math' has no attribute '{other}'"
        ))),
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let next = a % b;
        a = b;
        b = next;
    }
    a.abs()
}
