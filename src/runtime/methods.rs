//! Attribute access and the method tables of the built-in value types.

use std::sync::Arc;

use super::builtins::{self, sort_values, CallArgs};
use super::error::{RuntimeError, RuntimeResult};
use super::format::str_format;
use super::interpreter::Interpreter;
use super::value::{check_len, Callable, RecordRef, Value};

const STR_METHODS: &[&str] = &[
    "capitalize", "casefold", "center", "count", "endswith", "find", "format", "index", "isalnum",
    "isalpha", "isdecimal", "isdigit", "islower", "isnumeric", "isspace", "isupper", "join",
    "ljust", "lower", "lstrip", "partition", "removeprefix", "removesuffix", "replace", "rfind",
    "rindex", "rjust", "rpartition", "rsplit", "rstrip", "split", "splitlines", "startswith",
    "strip", "swapcase", "title", "upper", "zfill",
];
const LIST_METHODS: &[&str] = &[
    "append", "clear", "copy", "count", "extend", "index", "insert", "pop", "remove", "reverse",
    "sort",
];
const DICT_METHODS: &[&str] = &[
    "clear", "copy", "get", "items", "keys", "pop", "popitem", "setdefault", "update", "values",
];
const SET_METHODS: &[&str] = &[
    "add", "clear", "copy", "difference", "discard", "intersection", "issubset", "issuperset",
    "remove", "union", "update",
];
const TUPLE_METHODS: &[&str] = &["count", "index"];
const RECORD_METHODS: &[&str] = &["copy", "dict", "model_copy", "model_dump", "model_dump_json"];

pub fn has_method(value: &Value, name: &str) -> bool {
    let table = match value {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Set(_) => SET_METHODS,
        Value::Tuple(_) => TUPLE_METHODS,
        Value::Record(_) => RECORD_METHODS,
        Value::Int(_) | Value::Bool(_) => &["bit_length"],
        Value::Float(_) => &["is_integer"],
        _ => &[],
    };
    table.contains(&name)
}

fn no_attribute(value: &Value, name: &str) -> RuntimeError {
    RuntimeError::attribute_error(format!(
        "'{}' object has no attribute '{name}'",
        value.type_name()
    ))
}

/// `value.name` outside of a call: record fields, module members, bound methods.
pub fn get_attribute(value: &Value, name: &str) -> RuntimeResult<Value> {
    match value {
        Value::Record(record) => {
            if let Some(field) = record.read_recursive().get(name) {
                return Ok(field.clone());
            }
        }
        Value::Module(module) => {
            return builtins::module_member(*module, name).ok_or_else(|| {
                RuntimeError::attribute_error(format!(
                    "module '{}' has no attribute '{name}'",
                    module.name()
                ))
            });
        }
        Value::Exception(exception) if name == "args" => {
            return Ok(Value::tuple(vec![Value::str(&exception.message)]));
        }
        _ => {}
    }
    if has_method(value, name) {
        return Ok(Value::Callable(Callable::BoundMethod {
            receiver: Box::new(value.clone()),
            name: Arc::from(name),
        }));
    }
    Err(no_attribute(value, name))
}

/// `value.name = new`; only record fields are assignable.
pub fn set_attribute(value: &Value, name: &str, new: Value) -> RuntimeResult<()> {
    let Value::Record(record) = value else {
        return Err(no_attribute(value, name));
    };
    let schema = Arc::clone(&record.read_recursive().schema);
    let index = schema
        .fields
        .iter()
        .position(|field| field.name == name)
        .ok_or_else(|| {
            RuntimeError::exception(
                "ValidationError",
                format!("{} object has no field \"{name}\"", schema.name),
            )
        })?;
    let coerced = new.coerce(&schema.fields[index].ty)?;
    record.write().fields[index] = coerced;
    Ok(())
}

/// `receiver.name(args...)`.
pub fn call_method(
    interp: &mut Interpreter<'_>,
    receiver: &Value,
    name: &str,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> RuntimeResult<Value> {
    let call = CallArgs::new(name, args, kwargs);
    match receiver {
        Value::Str(text) => str_method(text, call),
        Value::List(_) => list_method(interp, receiver, call),
        Value::Dict(_) => dict_method(receiver, call),
        Value::Set(_) => set_method(receiver, call),
        Value::Tuple(items) => sequence_query(items, call),
        Value::Record(record) => {
            let field = record.read_recursive().get(name).cloned();
            match field {
                Some(field) => interp.call_value(&field, call.args, call.kwargs),
                None => record_method(record, call),
            }
        }
        Value::Int(value) if name == "bit_length" => {
            call.arity(0, 0)?;
            Ok(Value::Int(i64::from(64 - value.unsigned_abs().leading_zeros())))
        }
        Value::Bool(value) if name == "bit_length" => {
            call.arity(0, 0)?;
            Ok(Value::Int(i64::from(*value)))
        }
        Value::Float(value) if name == "is_integer" => {
            call.arity(0, 0)?;
            Ok(Value::Bool(value.is_finite() && value.fract() == 0.0))
        }
        other => {
            let callee = get_attribute(other, name)?;
            interp.call_value(&callee, call.args, call.kwargs)
        }
    }
}

fn text_arg(call: &CallArgs, index: usize) -> RuntimeResult<String> {
    match call.args.get(index) {
        Some(Value::Str(text)) => Ok(text.to_string()),
        Some(other) => Err(RuntimeError::type_error(format!(
            "{}() argument must be str, not {}",
            call.name,
            other.type_name()
        ))),
        None => Err(RuntimeError::type_error(format!(
            "{}() missing required argument",
            call.name
        ))),
    }
}

fn optional_text(call: &CallArgs, index: usize) -> RuntimeResult<Option<String>> {
    match call.args.get(index) {
        None | Some(Value::None) => Ok(None),
        Some(_) => text_arg(call, index).map(Some),
    }
}

fn char_index(text: &str, byte: usize) -> i64 {
    i64::try_from(text[..byte].chars().count()).unwrap_or(i64::MAX)
}

fn count_int(count: usize) -> Value {
    Value::Int(i64::try_from(count).unwrap_or(i64::MAX))
}

fn pad_text(text: &str, width: usize, fill: char, align: char) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let total = width - len;
    let (left, right) = match align {
        '<' => (0, total),
        '>' => (total, 0),
        _ => {
            let left = total / 2 + (total & width & 1);
            (left, total - left)
        }
    };
    let fill = |n: usize| std::iter::repeat_n(fill, n).collect::<String>();
    format!("{}{text}{}", fill(left), fill(right))
}

fn split_text(text: &str, sep: Option<&str>, maxsplit: i64, from_right: bool) -> RuntimeResult<Vec<Value>> {
    let limit = usize::try_from(maxsplit).ok();
    let parts: Vec<String> = match sep {
        Some("") => return Err(RuntimeError::value_error("empty separator")),
        Some(sep) => match (limit, from_right) {
            (None, _) => text.split(sep).map(str::to_string).collect(),
            (Some(limit), false) => text.splitn(limit + 1, sep).map(str::to_string).collect(),
            (Some(limit), true) => {
                let mut parts: Vec<String> =
                    text.rsplitn(limit + 1, sep).map(str::to_string).collect();
                parts.reverse();
                parts
            }
        },
        None => {
            let words: Vec<&str> = text.split_whitespace().collect();
            match limit {
                Some(limit) if words.len() > limit + 1 && !from_right => {
                    let mut parts: Vec<String> =
                        words[..limit].iter().map(|w| w.to_string()).collect();
                    let mut rest = text.trim_start();
                    for word in &words[..limit] {
                        rest = rest[word.len()..].trim_start();
                    }
                    parts.push(rest.to_string());
                    parts
                }
                Some(limit) if words.len() > limit + 1 => {
                    let keep = words.len() - limit;
                    let mut rest = text.trim_end();
                    for word in words[keep..].iter().rev() {
                        rest = rest[..rest.len() - word.len()].trim_end();
                    }
                    let mut parts = vec![rest.to_string()];
                    parts.extend(words[keep..].iter().map(|w| w.to_string()));
                    parts
                }
                _ => words.into_iter().map(str::to_string).collect(),
            }
        }
    };
    Ok(parts.into_iter().map(Value::str).collect())
}

fn affix_matches(call: &CallArgs, test: impl Fn(&str) -> bool) -> RuntimeResult<Value> {
    match call.args.first() {
        Some(Value::Str(affix)) => Ok(Value::Bool(test(affix))),
        Some(Value::Tuple(options)) => Ok(Value::Bool(
            options.iter().any(|option| option.as_str().is_some_and(&test)),
        )),
        _ => Err(RuntimeError::type_error(format!(
            "{} first arg must be str or a tuple of str",
            call.name
        ))),
    }
}

fn cased_check(text: &str, upper: bool) -> bool {
    let mut cased = false;
    for ch in text.chars() {
        if ch.is_uppercase() || ch.is_lowercase() {
            cased = true;
            if ch.is_uppercase() != upper {
                return false;
            }
        }
    }
    cased
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_cased = false;
    for ch in text.chars() {
        if previous_cased {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        previous_cased = ch.is_alphabetic();
    }
    out
}

fn str_method(text: &Arc<str>, mut call: CallArgs) -> RuntimeResult<Value> {
    let text: &str = text;
    let name = call.name.clone();
    if !matches!(name.as_str(), "format" | "split" | "rsplit" | "replace") {
        call.no_kwargs()?;
    }

    match name.as_str() {
        "upper" => Ok(Value::str(text.to_uppercase())),
        "lower" | "casefold" => Ok(Value::str(text.to_lowercase())),
        "swapcase" => Ok(Value::str(
            text.chars()
                .flat_map(|ch| {
                    if ch.is_uppercase() {
                        ch.to_lowercase().collect::<Vec<_>>()
                    } else {
                        ch.to_uppercase().collect::<Vec<_>>()
                    }
                })
                .collect::<String>(),
        )),
        "title" => Ok(Value::str(title_case(text))),
        "capitalize" => {
            let mut chars = text.chars();
            let Some(first) = chars.next() else {
                return Ok(Value::str(""));
            };
            let rest = chars.as_str().to_lowercase();
            Ok(Value::str(format!("{}{rest}", first.to_uppercase())))
        }
        "strip" | "lstrip" | "rstrip" => {
            call.arity(0, 1)?;
            let chars = optional_text(&call, 0)?;
            let matches = |ch: char| match &chars {
                Some(set) => set.contains(ch),
                None => ch.is_whitespace(),
            };
            Ok(Value::str(match name.as_str() {
                "strip" => text.trim_matches(matches),
                "lstrip" => text.trim_start_matches(matches),
                _ => text.trim_end_matches(matches),
            }))
        }
        "split" | "rsplit" => {
            let sep = call.kwarg("sep");
            let maxsplit = call.kwarg("maxsplit");
            call.no_kwargs()?;
            call.arity(0, 2)?;
            let sep = match sep.or_else(|| call.args.first().cloned()) {
                None | Some(Value::None) => None,
                Some(Value::Str(sep)) => Some(sep.to_string()),
                Some(other) => {
                    return Err(RuntimeError::type_error(format!(
                        "must be str or None, not {}",
                        other.type_name()
                    )));
                }
            };
            let maxsplit = maxsplit
                .or_else(|| call.args.get(1).cloned())
                .and_then(|value| value.as_int())
                .unwrap_or(-1);
            split_text(text, sep.as_deref(), maxsplit, name == "rsplit").map(Value::list)
        }
        "splitlines" => Ok(Value::list(text.lines().map(Value::str).collect())),
        "join" => {
            call.arity(1, 1)?;
            let mut parts = Vec::new();
            for (index, item) in call.args[0].iter()?.enumerate() {
                match item {
                    Value::Str(part) => parts.push(part),
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "sequence item {index}: expected str instance, {} found",
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(Value::str(parts.iter().map(|part| &**part).collect::<Vec<_>>().join(text)))
        }
        "replace" => {
            let count = call.kwarg("count");
            call.no_kwargs()?;
            call.arity(2, 3)?;
            let (old, new) = (text_arg(&call, 0)?, text_arg(&call, 1)?);
            let count = count
                .or_else(|| call.args.get(2).cloned())
                .and_then(|value| value.as_int())
                .unwrap_or(-1);
            if new.len() > old.len() {
                let matches = if old.is_empty() {
                    text.chars().count() + 1
                } else {
                    text.matches(old.as_str()).count()
                };
                let matches = usize::try_from(count).map_or(matches, |limit| matches.min(limit));
                let growth = matches.saturating_mul(new.len() - old.len());
                check_len(text.len().saturating_add(growth))?;
            }
            Ok(Value::str(match usize::try_from(count) {
                Ok(count) => text.replacen(&old, &new, count),
                Err(_) => text.replace(&old, &new),
            }))
        }
        "startswith" => affix_matches(&call, |affix| text.starts_with(affix)),
        "endswith" => affix_matches(&call, |affix| text.ends_with(affix)),
        "find" | "rfind" | "index" | "rindex" => {
            call.arity(1, 1)?;
            let needle = text_arg(&call, 0)?;
            let found = if name.starts_with('r') {
                text.rfind(&needle)
            } else {
                text.find(&needle)
            };
            match found {
                Some(byte) => Ok(Value::Int(char_index(text, byte))),
                None if name.ends_with("find") => Ok(Value::Int(-1)),
                None => Err(RuntimeError::value_error("substring not found")),
            }
        }
        "count" => {
            call.arity(1, 1)?;
            let needle = text_arg(&call, 0)?;
            if needle.is_empty() {
                return Ok(count_int(text.chars().count() + 1));
            }
            Ok(count_int(text.matches(&needle).count()))
        }
        "isdigit" | "isdecimal" => Ok(Value::Bool(
            !text.is_empty() && text.chars().all(|ch| ch.is_ascii_digit()),
        )),
        "isnumeric" => Ok(Value::Bool(!text.is_empty() && text.chars().all(char::is_numeric))),
        "isalpha" => Ok(Value::Bool(!text.is_empty() && text.chars().all(char::is_alphabetic))),
        "isalnum" => Ok(Value::Bool(!text.is_empty() && text.chars().all(char::is_alphanumeric))),
        "isspace" => Ok(Value::Bool(!text.is_empty() && text.chars().all(char::is_whitespace))),
        "isupper" => Ok(Value::Bool(cased_check(text, true))),
        "islower" => Ok(Value::Bool(cased_check(text, false))),
        "format" => str_format(text, &call.args, &call.kwargs).map(Value::str),
        "zfill" => {
            call.arity(1, 1)?;
            let width = check_len(usize::try_from(call.int(0)?).unwrap_or(0))?;
            let (sign, digits) = match text.strip_prefix(['-', '+']) {
                Some(rest) => (&text[..1], rest),
                None => ("", text),
            };
            let len = text.chars().count();
            if len >= width {
                return Ok(Value::str(text));
            }
            Ok(Value::str(format!("{sign}{}{digits}", "0".repeat(width - len))))
        }
        "center" | "ljust" | "rjust" => {
            call.arity(1, 2)?;
            let width = check_len(usize::try_from(call.int(0)?).unwrap_or(0))?;
            let fill = match optional_text(&call, 1)? {
                Some(fill) if fill.chars().count() == 1 => fill.chars().next().unwrap_or(' '),
                Some(_) => {
                    return Err(RuntimeError::type_error(
                        "The fill character must be exactly one character long",
                    ));
                }
                None => ' ',
            };
            let align = match name.as_str() {
                "ljust" => '<',
                "rjust" => '>',
                _ => '^',
            };
            Ok(Value::str(pad_text(text, width, fill, align)))
        }
        "partition" | "rpartition" => {
            call.arity(1, 1)?;
            let sep = text_arg(&call, 0)?;
            if sep.is_empty() {
                return Err(RuntimeError::value_error("empty separator"));
            }
            let found = if name == "partition" {
                text.find(&sep)
            } else {
                text.rfind(&sep)
            };
            let parts = match found {
                Some(byte) => [&text[..byte], sep.as_str(), &text[byte + sep.len()..]],
                None if name == "partition" => [text, "", ""],
                None => ["", "", text],
            };
            Ok(Value::tuple(parts.into_iter().map(Value::str).collect()))
        }
        "removeprefix" => {
            call.arity(1, 1)?;
            let prefix = text_arg(&call, 0)?;
            Ok(Value::str(text.strip_prefix(prefix.as_str()).unwrap_or(text)))
        }
        "removesuffix" => {
            call.arity(1, 1)?;
            let suffix = text_arg(&call, 0)?;
            Ok(Value::str(text.strip_suffix(suffix.as_str()).unwrap_or(text)))
        }
        other => Err(no_attribute(&Value::str(text), other)),
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

fn sequence_query(items: &[Value], call: CallArgs) -> RuntimeResult<Value> {
    call.no_kwargs()?;
    call.arity(1, 1)?;
    let needle = &call.args[0];
    match call.name.as_str() {
        "count" => Ok(count_int(items.iter().filter(|item| item.py_eq(needle)).count())),
        "index" => items
            .iter()
            .position(|item| item.py_eq(needle))
            .map(count_int)
            .ok_or_else(|| RuntimeError::value_error(format!("{} is not in list", needle.repr()))),
        other => Err(no_attribute(&Value::tuple(items.to_vec()), other)),
    }
}

fn list_method(
    interp: &mut Interpreter<'_>,
    receiver: &Value,
    mut call: CallArgs,
) -> RuntimeResult<Value> {
    let Value::List(list) = receiver else {
        return Err(no_attribute(receiver, &call.name));
    };
    let name = call.name.clone();
    if name == "sort" {
        let key = call.kwarg("key").filter(|key| !key.is_none());
        let reverse = call.kwarg("reverse").is_some_and(|value| value.truthy());
        call.no_kwargs()?;
        call.arity(0, 0)?;
        let items = list.read_recursive().clone();
        let sorted = sort_values(interp, items, key.as_ref(), reverse)?;
        *list.write() = sorted;
        return Ok(Value::None);
    }
    call.no_kwargs()?;

    match name.as_str() {
        "append" => {
            call.arity(1, 1)?;
            let item = call.args.remove(0);
            list.write().push(item);
            Ok(Value::None)
        }
        "extend" => {
            call.arity(1, 1)?;
            let items = call.args[0].to_vec()?;
            let mut list = list.write();
            check_len(list.len().saturating_add(items.len()))?;
            list.extend(items);
            Ok(Value::None)
        }
        "insert" => {
            call.arity(2, 2)?;
            let index = call.int(0)?;
            let item = call.args.remove(1);
            let mut items = list.write();
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let position = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(position as usize, item);
            Ok(Value::None)
        }
        "pop" => {
            call.arity(0, 1)?;
            let index = if call.args.is_empty() { -1 } else { call.int(0)? };
            let mut items = list.write();
            if items.is_empty() {
                return Err(RuntimeError::index_error("pop from empty list"));
            }
            let position = normalize_index(index, items.len())
                .ok_or_else(|| RuntimeError::index_error("pop index out of range"))?;
            Ok(items.remove(position))
        }
        "remove" => {
            call.arity(1, 1)?;
            let position = list
                .read_recursive()
                .iter()
                .position(|item| item.py_eq(&call.args[0]))
                .ok_or_else(|| RuntimeError::value_error("list.remove(x): x not in list"))?;
            list.write().remove(position);
            Ok(Value::None)
        }
        "index" | "count" => {
            let items = list.read_recursive().clone();
            sequence_query(&items, call)
        }
        "reverse" => {
            call.arity(0, 0)?;
            list.write().reverse();
            Ok(Value::None)
        }
        "copy" => {
            call.arity(0, 0)?;
            Ok(Value::list(list.read_recursive().clone()))
        }
        "clear" => {
            call.arity(0, 0)?;
            list.write().clear();
            Ok(Value::None)
        }
        other => Err(no_attribute(receiver, other)),
    }
}

fn dict_method(receiver: &Value, mut call: CallArgs) -> RuntimeResult<Value> {
    let Value::Dict(dict) = receiver else {
        return Err(no_attribute(receiver, &call.name));
    };
    let name = call.name.clone();
    if name != "update" {
        call.no_kwargs()?;
    }

    match name.as_str() {
        "get" => {
            call.arity(1, 2)?;
            let default = call.args.get(1).cloned().unwrap_or(Value::None);
            Ok(dict.read_recursive().get(&call.args[0])?.unwrap_or(default))
        }
        "keys" => Ok(Value::list(dict.read_recursive().keys())),
        "values" => Ok(Value::list(dict.read_recursive().values())),
        "items" => Ok(Value::list(
            dict.read_recursive()
                .items()
                .into_iter()
                .map(|(key, value)| Value::tuple(vec![key, value]))
                .collect(),
        )),
        "pop" => {
            call.arity(1, 2)?;
            let removed = dict.write().remove(&call.args[0])?;
            match (removed, call.args.get(1)) {
                (Some(value), _) => Ok(value),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(RuntimeError::key_error(call.args[0].repr())),
            }
        }
        "popitem" => {
            call.arity(0, 0)?;
            let last = dict.read_recursive().items().pop();
            let Some((key, value)) = last else {
                return Err(RuntimeError::key_error("'popitem(): dictionary is empty'"));
            };
            dict.write().remove(&key)?;
            Ok(Value::tuple(vec![key, value]))
        }
        "setdefault" => {
            call.arity(1, 2)?;
            let key = call.args[0].clone();
            if let Some(existing) = dict.read_recursive().get(&key)? {
                return Ok(existing);
            }
            let default = call.args.get(1).cloned().unwrap_or(Value::None);
            dict.write().insert(key, default.clone())?;
            Ok(default)
        }
        "update" => {
            call.arity(0, 1)?;
            let mut pairs = Vec::new();
            match call.args.first() {
                Some(Value::Dict(other)) => pairs.extend(other.read_recursive().items()),
                Some(iterable) => {
                    for item in iterable.iter()? {
                        let entry = item.to_vec()?;
                        let [key, value] = <[Value; 2]>::try_from(entry).map_err(|_| {
                            RuntimeError::value_error(
                                "dictionary update sequence element has wrong length",
                            )
                        })?;
                        pairs.push((key, value));
                    }
                }
                None => {}
            }
            pairs.extend(call.kwargs.drain(..).map(|(key, value)| (Value::str(key), value)));
            let mut target = dict.write();
            for (key, value) in pairs {
                target.insert(key, value)?;
            }
            Ok(Value::None)
        }
        "copy" => Ok(Value::dict(dict.read_recursive().clone())),
        "clear" => {
            dict.write().clear();
            Ok(Value::None)
        }
        other => Err(no_attribute(receiver, other)),
    }
}

fn set_method(receiver: &Value, call: CallArgs) -> RuntimeResult<Value> {
    let Value::Set(set) = receiver else {
        return Err(no_attribute(receiver, &call.name));
    };
    call.no_kwargs()?;
    let current: Vec<Value> = set.read_recursive().values().cloned().collect();

    match call.name.as_str() {
        "add" => {
            call.arity(1, 1)?;
            let item = call.args[0].clone();
            set.write().entry(item.hash_key()?).or_insert(item);
            Ok(Value::None)
        }
        "update" => {
            for other in &call.args {
                for item in other.iter()? {
                    set.write().entry(item.hash_key()?).or_insert(item);
                }
            }
            Ok(Value::None)
        }
        "remove" | "discard" => {
            call.arity(1, 1)?;
            let key = call.args[0].hash_key()?;
            let removed = set.write().shift_remove(&key);
            if removed.is_none() && call.name == "remove" {
                return Err(RuntimeError::key_error(call.args[0].repr()));
            }
            Ok(Value::None)
        }
        "union" => {
            let mut items = current;
            for other in &call.args {
                items.extend(other.iter()?);
            }
            Value::set(items)
        }
        "intersection" | "difference" => {
            let mut kept = current;
            for other in &call.args {
                let other = Value::set(other.to_vec()?)?;
                let Value::Set(other) = other else { continue };
                let other = other.read_recursive();
                let mut filtered = Vec::with_capacity(kept.len());
                for item in kept {
                    let inside = other.contains_key(&item.hash_key()?);
                    if inside == (call.name == "intersection") {
                        filtered.push(item);
                    }
                }
                kept = filtered;
            }
            Value::set(kept)
        }
        "issubset" | "issuperset" => {
            call.arity(1, 1)?;
            let other = call.args[0].to_vec()?;
            let (small, large) = if call.name == "issubset" {
                (current, other)
            } else {
                (other, current)
            };
            let Value::Set(large) = Value::set(large)? else {
                return Ok(Value::Bool(false));
            };
            let large = large.read_recursive();
            for item in small {
                if !large.contains_key(&item.hash_key()?) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        "copy" => Value::set(current),
        "clear" => {
            set.write().clear();
            Ok(Value::None)
        }
        other => Err(no_attribute(receiver, other)),
    }
}

fn record_method(record: &RecordRef, mut call: CallArgs) -> RuntimeResult<Value> {
    let receiver = Value::Record(Arc::clone(record));
    match call.name.as_str() {
        "model_dump" | "dict" => {
            call.no_kwargs()?;
            call.arity(0, 0)?;
            Ok(Value::from_json(&receiver.to_json()?))
        }
        "model_dump_json" => {
            call.no_kwargs()?;
            call.arity(0, 0)?;
            let json = receiver.to_json()?;
            serde_json::to_string(&json)
                .map(Value::str)
                .map_err(|err| RuntimeError::value_error(err.to_string()))
        }
        "model_copy" | "copy" => {
            let update = call.kwarg("update");
            call.no_kwargs()?;
            call.arity(0, 0)?;
            let copy = Value::Record(Arc::new(parking_lot::RwLock::new(
                record.read_recursive().clone(),
            )));
            if let Some(Value::Dict(update)) = update {
                for (key, value) in update.read_recursive().items() {
                    let field = key.as_str().map(str::to_string).unwrap_or_else(|| key.repr());
                    set_attribute(&copy, &field, value)?;
                }
            }
            Ok(copy)
        }
        other => Err(no_attribute(&receiver, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_split_honours_maxsplit() {
        let parts = split_text("  a  b c  ", None, 1, false).expect("split");
        assert_eq!(parts, vec![Value::str("a"), Value::str("b c  ")]);
        let parts = split_text("a b c", None, 1, true).expect("rsplit");
        assert_eq!(parts, vec![Value::str("a b"), Value::str("c")]);
    }

    #[test]
    fn centering_matches_python_padding() {
        assert_eq!(pad_text("ab", 5, '*', '^'), "**ab*");
        assert_eq!(pad_text("abc", 6, '*', '^'), "*abc**");
    }

    #[test]
    fn negative_indices_wrap() {
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(-4, 3), None);
    }

    #[test]
    fn attributes_of_plain_values_are_bound_methods() {
        let method = get_attribute(&Value::str("x"), "upper").expect("method");
        assert!(matches!(method, Value::Callable(Callable::BoundMethod { .. })));
        let err = get_attribute(&Value::Int(1), "nope").expect_err("missing");
        assert_eq!(err.kind(), Some("AttributeError"));
    }
}
