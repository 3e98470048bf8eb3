//! Function stubs: the declarations whose bodies get synthesized.

pub mod introspect;
pub mod site;

use std::sync::Arc;

pub use introspect::{
    introspect, render_signature, resolve_type_expression, ParamInfo, ResolveError, ReturnInfo,
    StubSignature,
};
pub use site::{DeclarationSite, StubKey};

use crate::runtime::Value;
use crate::schema::{Record, RecordSchema, TypeRef};

/// Descriptive metadata attached to a type hint.
#[derive(Debug, Clone, PartialEq)]
pub enum Metadata {
    Text(String),
    Field(FieldInfo),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldInfo {
    pub description: Option<String>,
}

impl FieldInfo {
    pub fn describe(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeHint {
    Missing,
    Type(TypeRef),
    /// A type expression such as `list[Point]`, resolved against the stub's records.
    Named(String),
    Annotated {
        base: Box<TypeHint>,
        metadata: Vec<Metadata>,
    },
}

impl TypeHint {
    pub fn annotated(base: impl Into<TypeHint>, metadata: Vec<Metadata>) -> Self {
        TypeHint::Annotated {
            base: Box::new(base.into()),
            metadata,
        }
    }

    /// Wraps the hint with a plain-text description.
    pub fn describe(self, description: impl Into<String>) -> Self {
        TypeHint::annotated(self, vec![Metadata::Text(description.into())])
    }
}

impl From<TypeRef> for TypeHint {
    fn from(ty: TypeRef) -> Self {
        TypeHint::Type(ty)
    }
}

impl From<&str> for TypeHint {
    fn from(expression: &str) -> Self {
        TypeHint::Named(expression.to_string())
    }
}

impl From<String> for TypeHint {
    fn from(expression: String) -> Self {
        TypeHint::Named(expression)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub hint: TypeHint,
    pub default: Option<Value>,
}

impl Param {
    pub fn new(name: impl Into<String>, hint: impl Into<TypeHint>) -> Self {
        Self {
            name: name.into(),
            hint: hint.into(),
            default: None,
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hint: TypeHint::Missing,
            default: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.hint = std::mem::replace(&mut self.hint, TypeHint::Missing).describe(description);
        self
    }

    pub fn field(mut self, info: FieldInfo) -> Self {
        let hint = std::mem::replace(&mut self.hint, TypeHint::Missing);
        self.hint = TypeHint::annotated(hint, vec![Metadata::Field(info)]);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// An undefined function: a signature and a docstring awaiting a body.
#[derive(Debug, Clone)]
pub struct FunctionStub {
    name: String,
    doc: Option<String>,
    params: Vec<Param>,
    returns: TypeHint,
    records: Vec<Arc<RecordSchema>>,
    site: DeclarationSite,
}

impl FunctionStub {
    /// Declares a stub at the caller's source location.
    #[track_caller]
    pub fn new(name: impl Into<String>) -> Self {
        Self::at(name, DeclarationSite::caller())
    }

    pub fn at(name: impl Into<String>, site: DeclarationSite) -> Self {
        Self {
            name: name.into(),
            doc: None,
            params: Vec::new(),
            returns: TypeHint::Missing,
            records: Vec::new(),
            site,
        }
    }

    pub fn doc(mut self, doc: impl AsRef<str>) -> Self {
        self.doc = Some(clean_doc(doc.as_ref()));
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, hint: impl Into<TypeHint>) -> Self {
        self.returns = hint.into();
        self
    }

    /// Makes a record available by name to `Named` hints and to the generated body.
    pub fn with_record(mut self, schema: impl Into<Arc<RecordSchema>>) -> Self {
        let schema = schema.into();
        if !self.records.iter().any(|known| known.name == schema.name) {
            self.records.push(schema);
        }
        self
    }

    pub fn register<T: Record>(self) -> Self {
        self.with_record(T::schema())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn docstring(&self) -> Option<&str> {
        self.doc.as_deref().filter(|doc| !doc.trim().is_empty())
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn return_hint(&self) -> &TypeHint {
        &self.returns
    }

    pub fn records(&self) -> &[Arc<RecordSchema>] {
        &self.records
    }

    pub fn site(&self) -> &DeclarationSite {
        &self.site
    }

    pub fn key(&self) -> StubKey {
        StubKey::new(&self.name, &self.site)
    }
}

/// Normalizes docstring indentation: the first line is trimmed, the rest lose
/// their common leading whitespace, and surrounding blank lines are dropped.
pub fn clean_doc(doc: &str) -> String {
    let mut lines = doc.lines();
    let first = lines.next().unwrap_or_default().trim().to_string();
    let rest: Vec<&str> = lines.collect();
    let margin = rest
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned = vec![first];
    for line in rest {
        cleaned.push(line.get(margin..).unwrap_or("").trim_end().to_string());
    }
    while cleaned.last().is_some_and(|line| line.is_empty()) {
        cleaned.pop();
    }
    while cleaned.first().is_some_and(|line| line.is_empty()) {
        cleaned.remove(0);
    }
    cleaned.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_doc_removes_common_indentation() {
        let doc = "\n    Add two numbers.\n\n        Returns the sum.\n    ";
        assert_eq!(clean_doc(doc), "Add two numbers.\n\n    Returns the sum.");
        assert_eq!(clean_doc("Single line.  "), "Single line.");
    }

    #[test]
    fn param_builders_wrap_hints() {
        let param = Param::new("a", TypeRef::Int).describe("First number").default(3i64);
        assert_eq!(
            param.hint,
            TypeHint::annotated(TypeRef::Int, vec![Metadata::Text("First number".into())])
        );
        assert_eq!(param.default, Some(Value::Int(3)));
    }

    #[test]
    fn stubs_declared_on_different_lines_have_different_keys() {
        let first = FunctionStub::new("add");
        let second = FunctionStub::new("add");
        assert_ne!(first.key(), second.key());
        assert_eq!(first.key(), first.clone().key());
    }
}
