use std::sync::Arc;

use serde_json::Value as Json;
use thiserror::Error;

use super::{FunctionStub, Metadata, TypeHint};
use crate::ast::{Expr, Literal};
use crate::lexer::tokenize;
use crate::parser::parse_expression;
use crate::runtime::value::quote_str;
use crate::schema::{RecordSchema, TypeRef};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    #[error("unknown type `{name}` referenced by `{context}`")]
    UnknownType { context: String, name: String },
    #[error("invalid type expression `{expression}` in `{context}`: {message}")]
    InvalidTypeExpression {
        context: String,
        expression: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub type_name: String,
    pub ty: TypeRef,
    pub description: Option<String>,
    pub schema: Option<Json>,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnInfo {
    pub type_name: String,
    pub ty: TypeRef,
    pub description: Option<String>,
    pub schema: Option<Json>,
}

/// Everything the prompt and the execution environment need to know about a stub.
#[derive(Debug, Clone, PartialEq)]
pub struct StubSignature {
    pub name: String,
    pub params: Vec<ParamInfo>,
    pub returns: ReturnInfo,
    /// Records reachable from the signature plus those registered on the stub.
    pub records: Vec<Arc<RecordSchema>>,
}

pub fn introspect(stub: &FunctionStub) -> Result<StubSignature, ResolveError> {
    let resolver = Resolver::new(stub);
    let mut records: Vec<Arc<RecordSchema>> = Vec::new();

    let mut params = Vec::with_capacity(stub.params().len());
    for param in stub.params() {
        let ty = resolver.resolve(&param.hint)?;
        ty.collect_records(&mut records);
        params.push(ParamInfo {
            name: param.name.clone(),
            type_name: ty.to_string(),
            schema: ty.as_record().map(|schema| schema.json_schema()),
            description: description(&param.hint),
            default: param.default.as_ref().map(|value| value.repr()),
            ty,
        });
    }

    let ty = resolver.resolve(stub.return_hint())?;
    ty.collect_records(&mut records);
    let returns = ReturnInfo {
        type_name: ty.to_string(),
        schema: ty.as_record().map(|schema| schema.json_schema()),
        description: description(stub.return_hint()),
        ty,
    };

    for record in stub.records() {
        TypeRef::Record(Arc::clone(record)).collect_records(&mut records);
    }

    Ok(StubSignature {
        name: stub.name().to_string(),
        params,
        returns,
        records,
    })
}

/// First description-bearing metadata item, outermost annotation first.
fn description(hint: &TypeHint) -> Option<String> {
    let TypeHint::Annotated { base, metadata } = hint else {
        return None;
    };
    metadata
        .iter()
        .find_map(|item| match item {
            Metadata::Text(text) => Some(text.clone()),
            Metadata::Field(info) => info.description.clone(),
        })
        .or_else(|| description(base))
}

/// Resolves a type expression such as `list[Point]` against `records`.
///
/// `context` names the declaration being resolved and appears in errors.
pub fn resolve_type_expression(
    expression: &str,
    records: &[Arc<RecordSchema>],
    context: &str,
) -> Result<TypeRef, ResolveError> {
    let resolver = Resolver {
        context,
        registry: records.to_vec(),
    };
    resolver.resolve_text(expression)
}

struct Resolver<'a> {
    context: &'a str,
    registry: Vec<Arc<RecordSchema>>,
}

impl<'a> Resolver<'a> {
    fn new(stub: &'a FunctionStub) -> Self {
        let mut registry: Vec<Arc<RecordSchema>> = Vec::new();
        for record in stub.records() {
            TypeRef::Record(Arc::clone(record)).collect_records(&mut registry);
        }
        let hints = stub
            .params()
            .iter()
            .map(|param| &param.hint)
            .chain(std::iter::once(stub.return_hint()));
        for hint in hints {
            collect_hint_records(hint, &mut registry);
        }
        Self {
            context: stub.name(),
            registry,
        }
    }

    fn resolve(&self, hint: &TypeHint) -> Result<TypeRef, ResolveError> {
        match hint {
            TypeHint::Missing => Ok(TypeRef::Any),
            TypeHint::Type(ty) => Ok(ty.clone()),
            TypeHint::Annotated { base, .. } => self.resolve(base),
            TypeHint::Named(expression) => self.resolve_text(expression),
        }
    }

    fn resolve_text(&self, expression: &str) -> Result<TypeRef, ResolveError> {
        let invalid = |message: String| ResolveError::InvalidTypeExpression {
            context: self.context.to_string(),
            expression: expression.to_string(),
            message,
        };
        let tokens = tokenize(expression).map_err(|errors| {
            invalid(errors.first().map(|e| e.to_string()).unwrap_or_default())
        })?;
        let expr = parse_expression(&tokens).map_err(|errors| {
            invalid(errors.first().map(|e| e.to_string()).unwrap_or_default())
        })?;
        self.resolve_expr(&expr)
    }

    fn resolve_expr(&self, expr: &Expr) -> Result<TypeRef, ResolveError> {
        match expr {
            Expr::Name(ident) => self.resolve_name(&ident.name),
            Expr::Attribute { attr, .. } => self.resolve_name(attr),
            Expr::Literal(Literal::None) => Ok(TypeRef::None),
            Expr::Literal(Literal::Str(forward)) => self.resolve_text(forward),
            Expr::Index { object, index } => {
                let container = match object.as_ref() {
                    Expr::Name(ident) => ident.name.as_str(),
                    Expr::Attribute { attr, .. } => attr.as_str(),
                    _ => return Err(self.unknown(expr)),
                };
                let args: Vec<&Expr> = match index.as_ref() {
                    Expr::Tuple(items) => items.iter().collect(),
                    single => vec![single],
                };
                match (container, args.as_slice()) {
                    ("list" | "List" | "Sequence" | "tuple" | "Tuple" | "set" | "Set", [item, ..]) => {
                        Ok(TypeRef::list(self.resolve_expr(item)?))
                    }
                    ("dict" | "Dict" | "Mapping", [key, value]) => Ok(TypeRef::dict(
                        self.resolve_expr(key)?,
                        self.resolve_expr(value)?,
                    )),
                    ("Optional", [inner]) => Ok(TypeRef::optional(self.resolve_expr(inner)?)),
                    ("Annotated", [base, ..]) => self.resolve_expr(base),
                    ("Union", members) => {
                        let non_null: Vec<&&Expr> = members
                            .iter()
                            .filter(|member| !matches!(member, Expr::Literal(Literal::None)))
                            .collect();
                        match non_null.as_slice() {
                            [single] if non_null.len() < members.len() => {
                                Ok(TypeRef::optional(self.resolve_expr(single)?))
                            }
                            _ => Ok(TypeRef::Any),
                        }
                    }
                    _ => Err(self.unknown(expr)),
                }
            }
            _ => Err(self.unknown(expr)),
        }
    }

    fn resolve_name(&self, name: &str) -> Result<TypeRef, ResolveError> {
        if let Some(ty) = TypeRef::primitive(name) {
            return Ok(ty);
        }
        self.registry
            .iter()
            .find(|record| record.name == name)
            .map(|record| TypeRef::Record(Arc::clone(record)))
            .ok_or_else(|| ResolveError::UnknownType {
                context: self.context.to_string(),
                name: name.to_string(),
            })
    }

    fn unknown(&self, expr: &Expr) -> ResolveError {
        let name = match expr {
            Expr::Index { object, .. } => match object.as_ref() {
                Expr::Name(ident) => ident.name.clone(),
                _ => "<expression>".to_string(),
            },
            _ => "<expression>".to_string(),
        };
        ResolveError::UnknownType {
            context: self.context.to_string(),
            name,
        }
    }
}

fn collect_hint_records(hint: &TypeHint, out: &mut Vec<Arc<RecordSchema>>) {
    match hint {
        TypeHint::Type(ty) => ty.collect_records(out),
        TypeHint::Annotated { base, .. } => collect_hint_records(base, out),
        TypeHint::Missing | TypeHint::Named(_) => {}
    }
}

/// Python-style signature text, e.g. `(a: int, b: int = 3) -> int`.
pub fn render_signature(stub: &FunctionStub) -> String {
    let params: Vec<String> = stub
        .params()
        .iter()
        .map(|param| {
            let default = param.default.as_ref().map(|value| value.repr());
            match (render_hint(&param.hint), default) {
                (Some(hint), Some(default)) => format!("{}: {hint} = {default}", param.name),
                (Some(hint), None) => format!("{}: {hint}", param.name),
                (None, Some(default)) => format!("{}={default}", param.name),
                (None, None) => param.name.clone(),
            }
        })
        .collect();

    let mut signature = format!("({})", params.join(", "));
    if let Some(returns) = render_hint(stub.return_hint()) {
        signature.push_str(" -> ");
        signature.push_str(&returns);
    }
    signature
}

fn render_hint(hint: &TypeHint) -> Option<String> {
    match hint {
        TypeHint::Missing => None,
        TypeHint::Type(ty) => Some(ty.to_string()),
        TypeHint::Named(expression) => Some(expression.clone()),
        TypeHint::Annotated { base, metadata } => {
            let base = render_hint(base).unwrap_or_else(|| "Any".to_string());
            let rendered: Vec<String> = metadata
                .iter()
                .map(|item| match item {
                    Metadata::Text(text) => quote_str(text),
                    Metadata::Field(info) => match &info.description {
                        Some(description) => {
                            format!("Field(description={})", quote_str(description))
                        }
                        None => "Field()".to_string(),
                    },
                })
                .collect();
            Some(format!("Annotated[{base}, {}]", rendered.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{FieldInfo, Param};

    fn point() -> RecordSchema {
        RecordSchema::new("Point")
            .field("x", TypeRef::Float, "X coordinate")
            .field("y", TypeRef::Float, "Y coordinate")
    }

    #[test]
    fn missing_hints_resolve_to_any() {
        let stub = FunctionStub::new("f").param(Param::untyped("x"));
        let signature = introspect(&stub).expect("introspect");
        assert_eq!(signature.params[0].ty, TypeRef::Any);
        assert_eq!(signature.params[0].type_name, "Any");
        assert_eq!(signature.returns.type_name, "Any");
    }

    #[test]
    fn named_hints_resolve_against_registered_records() {
        let stub = FunctionStub::new("centroid")
            .with_record(point())
            .param(Param::new("points", "list[Point]"))
            .returns("Optional[Point]");
        let signature = introspect(&stub).expect("introspect");
        assert_eq!(signature.params[0].type_name, "list[Point]");
        assert_eq!(signature.returns.type_name, "Optional[Point]");
        assert!(signature.params[0].schema.is_none());
        assert_eq!(signature.records.len(), 1);
    }

    #[test]
    fn unknown_named_type_is_a_resolve_error() {
        let stub = FunctionStub::new("f").param(Param::new("x", "Widget"));
        let err = introspect(&stub).expect_err("unknown");
        assert!(matches!(err, ResolveError::UnknownType { name, .. } if name == "Widget"));
    }

    #[test]
    fn first_description_bearing_metadata_wins() {
        let hint = TypeHint::annotated(
            TypeHint::annotated(TypeRef::Int, vec![Metadata::Text("inner".into())]),
            vec![
                Metadata::Field(FieldInfo::default()),
                Metadata::Field(FieldInfo::describe("outer field")),
                Metadata::Text("later".into()),
            ],
        );
        assert_eq!(description(&hint).as_deref(), Some("outer field"));
    }

    #[test]
    fn record_types_carry_their_schema() {
        let stub = FunctionStub::new("norm")
            .param(Param::new("p", TypeRef::record(point())).describe("A point"))
            .returns(TypeRef::Float);
        let signature = introspect(&stub).expect("introspect");
        let schema = signature.params[0].schema.as_ref().expect("schema");
        assert_eq!(schema["title"], "Point");
        assert_eq!(signature.params[0].description.as_deref(), Some("A point"));
    }

    #[test]
    fn signature_renders_like_python() {
        let stub = FunctionStub::new("add")
            .param(Param::new("a", TypeRef::Int).describe("First number"))
            .param(Param::new("b", TypeRef::Int).default(3i64))
            .param(Param::untyped("c").default("x"))
            .returns(TypeRef::Int);
        assert_eq!(
            render_signature(&stub),
            "(a: Annotated[int, 'First number'], b: int = 3, c='x') -> int"
        );
    }
}
