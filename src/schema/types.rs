use std::fmt;
use std::sync::Arc;

use super::record::{Record, RecordSchema};

/// A resolved type, rendered with Python-style names in prompts and signatures.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Any,
    None,
    Int,
    Float,
    Str,
    Bool,
    List(Box<TypeRef>),
    Dict(Box<TypeRef>, Box<TypeRef>),
    Optional(Box<TypeRef>),
    Record(Arc<RecordSchema>),
}

impl TypeRef {
    pub fn list(item: TypeRef) -> Self {
        TypeRef::List(Box::new(item))
    }

    pub fn dict(key: TypeRef, value: TypeRef) -> Self {
        TypeRef::Dict(Box::new(key), Box::new(value))
    }

    pub fn optional(inner: TypeRef) -> Self {
        TypeRef::Optional(Box::new(inner))
    }

    pub fn record(schema: RecordSchema) -> Self {
        TypeRef::Record(Arc::new(schema))
    }

    pub fn of_record<T: Record>() -> Self {
        TypeRef::record(T::schema())
    }

    /// Maps a bare primitive name (`int`, `list`, ...) to its type.
    pub fn primitive(name: &str) -> Option<Self> {
        let ty = match name {
            "Any" | "object" => TypeRef::Any,
            "None" | "NoneType" => TypeRef::None,
            "int" => TypeRef::Int,
            "float" => TypeRef::Float,
            "str" => TypeRef::Str,
            "bool" => TypeRef::Bool,
            "list" | "List" => TypeRef::list(TypeRef::Any),
            "dict" | "Dict" => TypeRef::dict(TypeRef::Any, TypeRef::Any),
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_record(&self) -> Option<&Arc<RecordSchema>> {
        match self {
            TypeRef::Record(schema) => Some(schema),
            _ => None,
        }
    }

    /// Every record reachable from this type, nested records included, deduplicated by name.
    pub fn collect_records(&self, out: &mut Vec<Arc<RecordSchema>>) {
        match self {
            TypeRef::List(item) | TypeRef::Optional(item) => item.collect_records(out),
            TypeRef::Dict(key, value) => {
                key.collect_records(out);
                value.collect_records(out);
            }
            TypeRef::Record(schema) => {
                if out.iter().any(|known| known.name == schema.name) {
                    return;
                }
                out.push(Arc::clone(schema));
                for field in &schema.fields {
                    field.ty.collect_records(out);
                }
            }
            TypeRef::Any
            | TypeRef::None
            | TypeRef::Int
            | TypeRef::Float
            | TypeRef::Str
            | TypeRef::Bool => {}
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Any => f.write_str("Any"),
            TypeRef::None => f.write_str("None"),
            TypeRef::Int => f.write_str("int"),
            TypeRef::Float => f.write_str("float"),
            TypeRef::Str => f.write_str("str"),
            TypeRef::Bool => f.write_str("bool"),
            TypeRef::List(item) if **item == TypeRef::Any => f.write_str("list"),
            TypeRef::List(item) => write!(f, "list[{item}]"),
            TypeRef::Dict(key, value) if **key == TypeRef::Any && **value == TypeRef::Any => {
                f.write_str("dict")
            }
            TypeRef::Dict(key, value) => write!(f, "dict[{key}, {value}]"),
            TypeRef::Optional(inner) => write!(f, "Optional[{inner}]"),
            TypeRef::Record(schema) => f.write_str(&schema.name),
        }
    }
}
