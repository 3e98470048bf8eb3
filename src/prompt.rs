//! Prompt composition for the completion model.

use std::fmt;

use serde_json::Value as Json;

use crate::schema::RecordSchema;
use crate::stub::{introspect, render_signature, FunctionStub, ParamInfo, ResolveError, ReturnInfo};

/// The text sent to the completion model for one stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Prompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

const DIRECTIVE: &str = "Return ONLY the function body. No def line, no docstring, no markdown.";

const DIALECT_RULES: &[&str] = &[
    "The body runs in a restricted Python subset:",
    "  - Only builtins and the `math` module are available; write `import math` inside the body to use it.",
    "  - No other imports, no file or network access, no classes, no `try`/`with`/`yield`/`async`.",
    "  - Dunder attributes such as `__dict__` are not accessible.",
    "  - Nested functions, lambdas, comprehensions and f-strings are supported.",
];

pub fn compose_prompt(stub: &FunctionStub) -> Result<Prompt, ResolveError> {
    let signature = introspect(stub)?;
    let composer = PromptComposer {
        name: stub.name(),
        signature: &render_signature(stub),
        doc: stub.docstring(),
        params: &signature.params,
        returns: &signature.returns,
        records: &signature.records,
    };
    Ok(composer.compose())
}

/// Lower-level composition from already introspected parts.
#[derive(Debug, Clone, Copy)]
pub struct PromptComposer<'a> {
    pub name: &'a str,
    pub signature: &'a str,
    pub doc: Option<&'a str>,
    pub params: &'a [ParamInfo],
    pub returns: &'a ReturnInfo,
    pub records: &'a [std::sync::Arc<RecordSchema>],
}

impl PromptComposer<'_> {
    pub fn compose(&self) -> Prompt {
        let mut lines = vec![
            "Implement this Python function:\n".to_string(),
            format!("def {}{}:", self.name, self.signature),
        ];
        if let Some(doc) = self.doc {
            lines.push(format!("    \"\"\"{doc}\"\"\""));
        }

        lines.push("\nParameter details:".to_string());
        for param in self.params {
            lines.extend(param_lines(param));
        }

        lines.push(format!("\nReturn type: {}", self.returns.type_name));
        if let Some(description) = &self.returns.description {
            lines.push(format!("  Description: {description}"));
        }
        if let Some(schema) = &self.returns.schema {
            lines.push(format!("  Schema: {}", render_schema(schema)));
        }

        lines.push(String::new());
        lines.extend(DIALECT_RULES.iter().map(|rule| rule.to_string()));
        if !self.records.is_empty() {
            let constructors: Vec<String> = self
                .records
                .iter()
                .map(|record| {
                    let fields: Vec<&str> =
                        record.fields.iter().map(|field| field.name.as_str()).collect();
                    format!("{}({})", record.name, fields.join(", "))
                })
                .collect();
            lines.push(format!(
                "  - Record constructors in scope (keyword arguments): {}",
                constructors.join(", ")
            ));
        }

        lines.push(format!("\n{DIRECTIVE}"));
        Prompt(lines.join("\n"))
    }
}

fn param_lines(param: &ParamInfo) -> Vec<String> {
    let mut line = format!("  - {}: {}", param.name, param.type_name);
    if let Some(description) = &param.description {
        line.push_str(" -- ");
        line.push_str(description);
    }
    if let Some(default) = &param.default {
        line.push_str(&format!(" (default: {default})"));
    }

    let mut lines = vec![line];
    if let Some(schema) = &param.schema {
        lines.push(format!("    Schema: {}", render_schema(schema)));
    }
    lines
}

fn render_schema(schema: &Json) -> String {
    serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeRef;
    use crate::stub::Param;

    #[test]
    fn prompt_lists_parameters_in_order() {
        let stub = FunctionStub::new("add")
            .doc("Add two numbers.")
            .param(Param::new("a", TypeRef::Int).describe("First number"))
            .param(Param::new("b", TypeRef::Int).default(3i64))
            .returns(TypeRef::Int);
        let prompt = compose_prompt(&stub).expect("prompt");
        let text = prompt.as_str();

        assert!(text.starts_with("Implement this Python function:\n\ndef add("));
        assert!(text.contains("    \"\"\"Add two numbers.\"\"\""));
        let a = text.find("  - a: int -- First number").expect("a");
        let b = text.find("  - b: int (default: 3)").expect("b");
        assert!(a < b);
        assert!(text.contains("\nReturn type: int"));
        assert!(text.ends_with(DIRECTIVE));
    }

    #[test]
    fn missing_docstring_is_omitted() {
        let stub = FunctionStub::new("noop").returns(TypeRef::None);
        let text = compose_prompt(&stub).expect("prompt").into_string();
        assert!(!text.contains("\"\"\""));
        assert!(text.contains("\nReturn type: None"));
    }
}
