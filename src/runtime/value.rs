use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Number, Value as Json};

use super::error::{RuntimeError, RuntimeResult};
use super::format::format_float;
use super::interpreter::Closure;
use crate::schema::{Record, RecordSchema, TypeRef};

pub type ListRef = Arc<RwLock<Vec<Value>>>;
pub type DictRef = Arc<RwLock<Dict>>;
pub type RecordRef = Arc<RwLock<RecordValue>>;
pub type SetRef = Arc<RwLock<IndexMap<HashKey, Value>>>;

const MAX_REPR_DEPTH: usize = 64;

/// Largest string (in bytes) or sequence a single operation may build.
pub const MAX_SEQUENCE_LEN: usize = 1 << 22;

/// Rejects results longer than [`MAX_SEQUENCE_LEN`] before they are allocated.
pub fn check_len(len: usize) -> RuntimeResult<usize> {
    if len > MAX_SEQUENCE_LEN {
        return Err(RuntimeError::memory_error(format!(
            "result of length {len} exceeds the limit of {MAX_SEQUENCE_LEN}"
        )));
    }
    Ok(len)
}

/// Dialect value. Lists, dicts and records are shared references like their
/// Python counterparts; strings and tuples are immutable.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(ListRef),
    Tuple(Arc<[Value]>),
    Dict(DictRef),
    Set(SetRef),
    Record(RecordRef),
    Range { start: i64, stop: i64, step: i64 },
    Callable(Callable),
    Module(Module),
    Exception(Arc<ExceptionValue>),
}

#[derive(Clone)]
pub enum Callable {
    Builtin(&'static str),
    RecordType(Arc<RecordSchema>),
    Function(Arc<Closure>),
    BoundMethod { receiver: Box<Value>, name: Arc<str> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Math,
}

impl Module {
    pub fn name(self) -> &'static str {
        match self {
            Module::Math => "math",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionValue {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct RecordValue {
    pub schema: Arc<RecordSchema>,
    pub fields: Vec<Value>,
}

impl RecordValue {
    pub fn get(&self, name: &str) -> Option<&Value> {
        let index = self.schema.fields.iter().position(|field| field.name == name)?;
        self.fields.get(index)
    }
}

/// Hashable projection of a value, used as the dict key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    None,
    Int(i64),
    Float(u64),
    Str(Arc<str>),
    Tuple(Vec<HashKey>),
}

/// Insertion-ordered mapping that keeps the original key objects.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: IndexMap<HashKey, (Value, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> RuntimeResult<Option<Value>> {
        let hash = key.hash_key()?;
        Ok(self.entries.get(&hash).map(|(_, value)| value.clone()))
    }

    pub fn contains(&self, key: &Value) -> RuntimeResult<bool> {
        Ok(self.entries.contains_key(&key.hash_key()?))
    }

    pub fn insert(&mut self, key: Value, value: Value) -> RuntimeResult<()> {
        match self.entries.entry(key.hash_key()?) {
            Entry::Occupied(mut entry) => entry.get_mut().1 = value,
            Entry::Vacant(entry) => {
                entry.insert((key, value));
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &Value) -> RuntimeResult<Option<Value>> {
        let hash = key.hash_key()?;
        Ok(self.entries.shift_remove(&hash).map(|(_, value)| value))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.values().map(|(key, _)| key.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.values().map(|(_, value)| value.clone()).collect()
    }

    pub fn items(&self) -> Vec<(Value, Value)> {
        self.entries.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.values().map(|(key, value)| (key, value))
    }
}

/// Iterator over an iterable value; ranges stay lazy, everything else is snapshotted.
pub enum ValueIter {
    Items(std::vec::IntoIter<Value>),
    Range { next: i64, stop: i64, step: i64 },
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::Items(items) => items.next(),
            ValueIter::Range { next, stop, step } => {
                let more = if *step > 0 { *next < *stop } else { *next > *stop };
                if !more {
                    return None;
                }
                let current = *next;
                *next = next.saturating_add(*step);
                if *next == current {
                    *next = *stop;
                }
                Some(Value::Int(current))
            }
        }
    }
}

impl Value {
    pub fn str(text: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(text.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Arc::from(items))
    }

    pub fn dict(dict: Dict) -> Self {
        Value::Dict(Arc::new(RwLock::new(dict)))
    }

    pub fn set(items: Vec<Value>) -> RuntimeResult<Self> {
        let mut set = IndexMap::with_capacity(items.len());
        for item in items {
            set.entry(item.hash_key()?).or_insert(item);
        }
        Ok(Value::Set(Arc::new(RwLock::new(set))))
    }

    pub fn from_pairs(pairs: Vec<(Value, Value)>) -> RuntimeResult<Self> {
        let mut dict = Dict::new();
        for (key, value) in pairs {
            dict.insert(key, value)?;
        }
        Ok(Value::dict(dict))
    }

    pub fn exception(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Value::Exception(Arc::new(ExceptionValue {
            kind: kind.into(),
            message: message.into(),
        }))
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::None => "NoneType".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "str".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Tuple(_) => "tuple".to_string(),
            Value::Dict(_) => "dict".to_string(),
            Value::Set(_) => "set".to_string(),
            Value::Record(record) => record.read_recursive().schema.name.clone(),
            Value::Range { .. } => "range".to_string(),
            Value::Callable(Callable::Builtin(_)) => "builtin_function_or_method".to_string(),
            Value::Callable(Callable::RecordType(_)) => "type".to_string(),
            Value::Callable(Callable::Function(_)) => "function".to_string(),
            Value::Callable(Callable::BoundMethod { .. }) => "method".to_string(),
            Value::Module(_) => "module".to_string(),
            Value::Exception(exception) => exception.kind.clone(),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(value) => *value,
            Value::Int(value) => *value != 0,
            Value::Float(value) => *value != 0.0,
            Value::Str(text) => !text.is_empty(),
            Value::List(items) => !items.read_recursive().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(dict) => !dict.read_recursive().is_empty(),
            Value::Set(set) => !set.read_recursive().is_empty(),
            Value::Range { .. } => self.len().map(|len| len > 0).unwrap_or(true),
            Value::Record(_) | Value::Callable(_) | Value::Module(_) | Value::Exception(_) => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Bool(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn len(&self) -> RuntimeResult<usize> {
        match self {
            Value::Str(text) => Ok(text.chars().count()),
            Value::List(items) => Ok(items.read_recursive().len()),
            Value::Tuple(items) => Ok(items.len()),
            Value::Dict(dict) => Ok(dict.read_recursive().len()),
            Value::Set(set) => Ok(set.read_recursive().len()),
            Value::Range { start, stop, step } => Ok(range_len(*start, *stop, *step)),
            other => Err(RuntimeError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))),
        }
    }

    pub fn iter(&self) -> RuntimeResult<ValueIter> {
        let items = match self {
            Value::Range { start, stop, step } => {
                return Ok(ValueIter::Range {
                    next: *start,
                    stop: *stop,
                    step: *step,
                });
            }
            Value::Str(text) => text.chars().map(|ch| Value::str(ch.to_string())).collect(),
            Value::List(items) => items.read_recursive().clone(),
            Value::Tuple(items) => items.to_vec(),
            Value::Dict(dict) => dict.read_recursive().keys(),
            Value::Set(set) => set.read_recursive().values().cloned().collect(),
            other => {
                return Err(RuntimeError::type_error(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                )));
            }
        };
        Ok(ValueIter::Items(items.into_iter()))
    }

    pub fn to_vec(&self) -> RuntimeResult<Vec<Value>> {
        if let Value::Range { start, stop, step } = self {
            check_len(range_len(*start, *stop, *step))?;
        }
        Ok(self.iter()?.collect())
    }

    pub fn hash_key(&self) -> RuntimeResult<HashKey> {
        match self {
            Value::None => Ok(HashKey::None),
            Value::Bool(value) => Ok(HashKey::Int(i64::from(*value))),
            Value::Int(value) => Ok(HashKey::Int(*value)),
            Value::Float(value) => {
                if value.fract() == 0.0 && value.abs() < 9.0e18 {
                    Ok(HashKey::Int(*value as i64))
                } else {
                    Ok(HashKey::Float(value.to_bits()))
                }
            }
            Value::Str(text) => Ok(HashKey::Str(Arc::clone(text))),
            Value::Tuple(items) => items
                .iter()
                .map(Value::hash_key)
                .collect::<RuntimeResult<Vec<_>>>()
                .map(HashKey::Tuple),
            other => Err(RuntimeError::type_error(format!(
                "unhashable type: '{}'",
                other.type_name()
            ))),
        }
    }

    pub fn py_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Arc::ptr_eq(a, b) || seq_eq(&a.read_recursive(), &b.read_recursive())
            }
            (Value::Tuple(a), Value::Tuple(b)) => seq_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.read_recursive();
                let b = b.read_recursive();
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        matches!(b.get(key), Ok(Some(other)) if other.py_eq(value))
                    })
            }
            (Value::Set(a), Value::Set(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.read_recursive();
                let b = b.read_recursive();
                a.len() == b.len() && a.keys().all(|key| b.contains_key(key))
            }
            (Value::Record(a), Value::Record(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.read_recursive();
                let b = b.read_recursive();
                a.schema.name == b.schema.name && seq_eq(&a.fields, &b.fields)
            }
            (
                Value::Range {
                    start: a0,
                    stop: a1,
                    step: a2,
                },
                Value::Range {
                    start: b0,
                    stop: b1,
                    step: b2,
                },
            ) => (a0, a1, a2) == (b0, b1, b2),
            (Value::Callable(a), Value::Callable(b)) => match (a, b) {
                (Callable::Builtin(a), Callable::Builtin(b)) => a == b,
                (Callable::RecordType(a), Callable::RecordType(b)) => a.name == b.name,
                (Callable::Function(a), Callable::Function(b)) => Arc::ptr_eq(a, b),
                _ => false,
            },
            (Value::Module(a), Value::Module(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => a == b,
            (a, b) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => match (a.as_int(), b.as_int()) {
                    (Some(i), Some(j)) => i == j,
                    _ => x == y,
                },
                _ => false,
            },
        }
    }

    /// Python ordering; `symbol` names the operator in the error message.
    pub fn py_cmp(&self, other: &Value, symbol: &str) -> RuntimeResult<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                let a = a.read_recursive().clone();
                let b = b.read_recursive().clone();
                seq_cmp(&a, &b, symbol)
            }
            (Value::Tuple(a), Value::Tuple(b)) => seq_cmp(a, b, symbol),
            (a, b) => match (a.as_int(), b.as_int()) {
                (Some(i), Some(j)) => Ok(i.cmp(&j)),
                _ => match (a.as_float(), b.as_float()) {
                    (Some(x), Some(y)) => Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal)),
                    _ => Err(RuntimeError::type_error(format!(
                        "'{symbol}' not supported between instances of '{}' and '{}'",
                        a.type_name(),
                        b.type_name()
                    ))),
                },
            },
        }
    }

    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, 0);
        out
    }

    /// `str()` rendering.
    pub fn to_display(&self) -> String {
        match self {
            Value::Str(text) => text.to_string(),
            Value::Exception(exception) => exception.message.clone(),
            other => other.repr(),
        }
    }

    fn write_repr(&self, out: &mut String, depth: usize) {
        if depth > MAX_REPR_DEPTH {
            out.push_str("...");
            return;
        }
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(value) => out.push_str(&value.to_string()),
            Value::Float(value) => out.push_str(&format_float(*value)),
            Value::Str(text) => out.push_str(&quote_str(text)),
            Value::List(items) => {
                let items = items.read_recursive().clone();
                write_seq(out, "[", "]", &items, depth);
            }
            Value::Tuple(items) if items.len() == 1 => {
                out.push('(');
                items[0].write_repr(out, depth + 1);
                out.push_str(",)");
            }
            Value::Tuple(items) => write_seq(out, "(", ")", items, depth),
            Value::Dict(dict) => {
                let items = dict.read_recursive().items();
                out.push('{');
                for (index, (key, value)) in items.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    key.write_repr(out, depth + 1);
                    out.push_str(": ");
                    value.write_repr(out, depth + 1);
                }
                out.push('}');
            }
            Value::Set(set) => {
                let items: Vec<Value> = set.read_recursive().values().cloned().collect();
                if items.is_empty() {
                    out.push_str("set()");
                } else {
                    write_seq(out, "{", "}", &items, depth);
                }
            }
            Value::Record(record) => {
                let record = record.read_recursive().clone();
                out.push_str(&record.schema.name);
                out.push('(');
                for (index, (field, value)) in
                    record.schema.fields.iter().zip(&record.fields).enumerate()
                {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&field.name);
                    out.push('=');
                    value.write_repr(out, depth + 1);
                }
                out.push(')');
            }
            Value::Range { start, stop, step } if *step == 1 => {
                out.push_str(&format!("range({start}, {stop})"));
            }
            Value::Range { start, stop, step } => {
                out.push_str(&format!("range({start}, {stop}, {step})"));
            }
            Value::Callable(Callable::Builtin(name)) => {
                out.push_str(&format!("<built-in function {name}>"));
            }
            Value::Callable(Callable::RecordType(schema)) => {
                out.push_str(&format!("<class '{}'>", schema.name));
            }
            Value::Callable(Callable::Function(closure)) => {
                out.push_str(&format!("<function {}>", closure.name()));
            }
            Value::Callable(Callable::BoundMethod { receiver, name }) => {
                out.push_str(&format!(
                    "<built-in method {name} of {} object>",
                    receiver.type_name()
                ));
            }
            Value::Module(module) => out.push_str(&format!("<module '{}'>", module.name())),
            Value::Exception(exception) => {
                out.push_str(&format!(
                    "{}({})",
                    exception.kind,
                    quote_str(&exception.message)
                ));
            }
        }
    }

    pub fn to_json(&self) -> RuntimeResult<Json> {
        let json = match self {
            Value::None => Json::Null,
            Value::Bool(value) => Json::Bool(*value),
            Value::Int(value) => Json::Number(Number::from(*value)),
            Value::Float(value) => Number::from_f64(*value)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Str(text) => Json::String(text.to_string()),
            Value::List(_) | Value::Tuple(_) | Value::Set(_) | Value::Range { .. } => Json::Array(
                self.to_vec()?
                    .iter()
                    .map(Value::to_json)
                    .collect::<RuntimeResult<Vec<_>>>()?,
            ),
            Value::Dict(dict) => {
                let items = dict.read_recursive().items();
                let mut map = Map::new();
                for (key, value) in items {
                    let key = match key {
                        Value::Str(text) => text.to_string(),
                        Value::Int(_) | Value::Float(_) | Value::Bool(_) | Value::None => {
                            key.to_json()?.to_string()
                        }
                        other => {
                            return Err(RuntimeError::type_error(format!(
                                "keys must be str, int, float, bool or None, not {}",
                                other.type_name()
                            )));
                        }
                    };
                    map.insert(key, value.to_json()?);
                }
                Json::Object(map)
            }
            Value::Record(record) => {
                let record = record.read_recursive().clone();
                let mut map = Map::new();
                for (field, value) in record.schema.fields.iter().zip(&record.fields) {
                    map.insert(field.name.clone(), value.to_json()?);
                }
                Json::Object(map)
            }
            other => {
                return Err(RuntimeError::type_error(format!(
                    "Object of type {} is not JSON serializable",
                    other.type_name()
                )));
            }
        };
        Ok(json)
    }

    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::None,
            Json::Bool(value) => Value::Bool(*value),
            Json::Number(number) => match number.as_i64() {
                Some(int) => Value::Int(int),
                None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(text) => Value::str(text),
            Json::Array(items) => Value::list(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => {
                let mut dict = Dict::new();
                for (key, value) in map {
                    // string keys always hash
                    let _ = dict.insert(Value::str(key), Value::from_json(value));
                }
                Value::dict(dict)
            }
        }
    }

    /// Converts JSON into a value shaped by `ty`: objects become records where a record is declared.
    pub fn from_json_typed(json: &Json, ty: &TypeRef) -> RuntimeResult<Value> {
        Value::from_json(json).coerce(ty)
    }

    /// Converts a host record into a dialect record through its serde form.
    pub fn from_record<T: Record>(record: &T) -> RuntimeResult<Value> {
        let json = serde_json::to_value(record)
            .map_err(|err| RuntimeError::type_error(err.to_string()))?;
        Value::from_json_typed(&json, &TypeRef::of_record::<T>())
    }

    /// Lax conversion applied at record boundaries: int to float, dict to record.
    pub fn coerce(self, ty: &TypeRef) -> RuntimeResult<Value> {
        match (ty, self) {
            (TypeRef::Float, Value::Int(value)) => Ok(Value::Float(value as f64)),
            (TypeRef::Optional(_), Value::None) => Ok(Value::None),
            (TypeRef::Optional(inner), value) => value.coerce(inner),
            (TypeRef::Record(schema), Value::Dict(dict)) => {
                let items = dict.read_recursive().items();
                let mut kwargs = Vec::with_capacity(items.len());
                for (key, value) in items {
                    match key {
                        Value::Str(name) => kwargs.push((name.to_string(), value)),
                        other => {
                            return Err(RuntimeError::type_error(format!(
                                "{} field names must be strings, got {}",
                                schema.name,
                                other.type_name()
                            )));
                        }
                    }
                }
                construct_record(schema, Vec::new(), kwargs)
            }
            (TypeRef::List(item), value @ (Value::List(_) | Value::Tuple(_)))
                if **item != TypeRef::Any =>
            {
                let items = value
                    .to_vec()?
                    .into_iter()
                    .map(|element| element.coerce(item))
                    .collect::<RuntimeResult<Vec<_>>>()?;
                Ok(Value::list(items))
            }
            (TypeRef::Dict(_, item), Value::Dict(dict)) if **item != TypeRef::Any => {
                let mut coerced = Dict::new();
                for (key, value) in dict.read_recursive().items() {
                    coerced.insert(key, value.coerce(item)?)?;
                }
                Ok(Value::dict(coerced))
            }
            (_, value) => Ok(value),
        }
    }
}

/// Builds a record instance, coercing each field to its declared type.
pub fn construct_record(
    schema: &Arc<RecordSchema>,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> RuntimeResult<Value> {
    let field_count = schema.fields.len();
    if args.len() > field_count {
        return Err(RuntimeError::type_error(format!(
            "{}() takes {} positional arguments but {} were given",
            schema.name,
            field_count,
            args.len()
        )));
    }

    let mut slots: Vec<Option<Value>> = vec![None; field_count];
    for (slot, value) in slots.iter_mut().zip(args) {
        *slot = Some(value);
    }
    for (name, value) in kwargs {
        let index = schema
            .fields
            .iter()
            .position(|field| field.name == name)
            .ok_or_else(|| {
                RuntimeError::type_error(format!(
                    "{}() got an unexpected keyword argument '{name}'",
                    schema.name
                ))
            })?;
        if slots[index].is_some() {
            return Err(RuntimeError::type_error(format!(
                "{}() got multiple values for argument '{name}'",
                schema.name
            )));
        }
        slots[index] = Some(value);
    }

    let mut fields = Vec::with_capacity(field_count);
    for (field, slot) in schema.fields.iter().zip(slots) {
        let value = match (slot, &field.default) {
            (Some(value), _) => value,
            (None, Some(default)) => Value::from_json(default),
            (None, None) => {
                return Err(RuntimeError::exception(
                    "ValidationError",
                    format!("{}.{}: field required", schema.name, field.name),
                ));
            }
        };
        fields.push(value.coerce(&field.ty)?);
    }

    Ok(Value::Record(Arc::new(RwLock::new(RecordValue {
        schema: Arc::clone(schema),
        fields,
    }))))
}

pub fn range_len(start: i64, stop: i64, step: i64) -> usize {
    let span = if step > 0 {
        stop.saturating_sub(start)
    } else {
        start.saturating_sub(stop)
    };
    if span <= 0 {
        return 0;
    }
    let step = step.unsigned_abs();
    (span as u64).div_ceil(step) as usize
}

fn seq_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
}

fn seq_cmp(a: &[Value], b: &[Value], symbol: &str) -> RuntimeResult<Ordering> {
    for (x, y) in a.iter().zip(b) {
        if x.py_eq(y) {
            continue;
        }
        return x.py_cmp(y, symbol);
    }
    Ok(a.len().cmp(&b.len()))
}

fn write_seq(out: &mut String, open: &str, close: &str, items: &[Value], depth: usize) {
    out.push_str(open);
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        item.write_repr(out, depth + 1);
    }
    out.push_str(close);
}

/// Python `repr` quoting: single quotes unless the text contains only single quotes.
pub fn quote_str(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::str(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::str(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::None, Into::into)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.py_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display())
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Value::Callable(self.clone()).repr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_follows_python_conventions() {
        let value = Value::list(vec![
            Value::Int(1),
            Value::Float(2.0),
            Value::str("it's"),
            Value::None,
            Value::tuple(vec![Value::Bool(true)]),
        ]);
        assert_eq!(value.repr(), "[1, 2.0, \"it's\", None, (True,)]");
    }

    #[test]
    fn numeric_equality_crosses_int_and_float() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::str("3"), Value::Int(3));
    }

    #[test]
    fn dict_keys_unify_numeric_equivalents() {
        let mut dict = Dict::new();
        dict.insert(Value::Int(1), Value::str("int")).expect("insert");
        dict.insert(Value::Float(1.0), Value::str("float")).expect("insert");
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.keys(), vec![Value::Int(1)]);
        assert_eq!(dict.get(&Value::Bool(true)).expect("get"), Some(Value::str("float")));
    }

    #[test]
    fn lists_are_unhashable() {
        let err = Value::list(Vec::new()).hash_key().expect_err("unhashable");
        assert_eq!(err.kind(), Some("TypeError"));
    }

    #[test]
    fn record_construction_coerces_ints_and_dicts() {
        let point = Arc::new(
            RecordSchema::new("Point")
                .field("x", TypeRef::Float, "X")
                .field("y", TypeRef::Float, "Y"),
        );
        let segment = Arc::new(
            RecordSchema::new("Segment")
                .field("start", TypeRef::Record(Arc::clone(&point)), "start")
                .field("end", TypeRef::Record(Arc::clone(&point)), "end"),
        );

        let start = Value::from_json(&serde_json::json!({ "x": 0, "y": 1 }));
        let end = construct_record(&point, vec![Value::Int(3), Value::Int(4)], Vec::new())
            .expect("point");
        let value = construct_record(
            &segment,
            Vec::new(),
            vec![("start".to_string(), start), ("end".to_string(), end)],
        )
        .expect("segment");

        assert_eq!(
            value.repr(),
            "Segment(start=Point(x=0.0, y=1.0), end=Point(x=3.0, y=4.0))"
        );
    }

    #[test]
    fn missing_record_field_is_a_validation_error() {
        let point = Arc::new(RecordSchema::new("Point").field("x", TypeRef::Float, "X"));
        let err = construct_record(&point, Vec::new(), Vec::new()).expect_err("missing");
        assert_eq!(err.kind(), Some("ValidationError"));
    }

    #[test]
    fn range_iterates_lazily_with_negative_steps() {
        let range = Value::Range {
            start: 5,
            stop: 0,
            step: -2,
        };
        let items: Vec<Value> = range.iter().expect("iter").collect();
        assert_eq!(items, vec![Value::Int(5), Value::Int(3), Value::Int(1)]);
        assert_eq!(range.len().expect("len"), 3);
    }
}
