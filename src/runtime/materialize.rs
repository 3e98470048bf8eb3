use thiserror::Error;
use tracing::debug;

use super::check::{check_program, CheckError};
use super::environment::{CompiledFunction, Environment};
use super::interpreter::ExecutionLimits;
use crate::lexer::{tokenize, LexerError, Span};
use crate::parser::{parse, ParserError};
use crate::utils::errors::{Diagnostic, DiagnosticSeverity};

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("lexing failed: {}", first_message(.0))]
    Lex(Vec<LexerError>),
    #[error("parsing failed: {}", first_message(.0))]
    Parse(Vec<ParserError>),
    #[error("check failed: {}", first_message(.0))]
    Check(Vec<CheckError>),
    #[error("source does not define function `{expected}`")]
    MissingDefinition { expected: String },
}

fn first_message<E: std::fmt::Display>(errors: &[E]) -> String {
    match errors {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

impl MaterializeError {
    pub fn diagnostics(&self, source_id: &str) -> Vec<Diagnostic> {
        match self {
            MaterializeError::Lex(errors) => {
                errors.iter().map(|e| e.to_diagnostic(source_id)).collect()
            }
            MaterializeError::Parse(errors) => {
                errors.iter().map(|e| e.to_diagnostic(source_id)).collect()
            }
            MaterializeError::Check(errors) => {
                errors.iter().map(|e| e.to_diagnostic(source_id)).collect()
            }
            MaterializeError::MissingDefinition { .. } => vec![Diagnostic::new(
                DiagnosticSeverity::Error,
                source_id,
                Span::new(0, 0),
                self.to_string(),
            )],
        }
    }
}

/// Turns source text into a callable bound to `expected_name`.
///
/// Every top-level `def` becomes a global of the returned function's
/// environment, next to the constructors of the records in `env`.
pub fn materialize(
    source: &str,
    expected_name: &str,
    mut env: Environment,
    limits: ExecutionLimits,
) -> Result<CompiledFunction, MaterializeError> {
    let tokens = tokenize(source).map_err(MaterializeError::Lex)?;
    let program = parse(&tokens).map_err(MaterializeError::Parse)?;
    if program.function(expected_name).is_none() {
        return Err(MaterializeError::MissingDefinition {
            expected: expected_name.to_string(),
        });
    }

    for function in program.functions() {
        env.define_function(function);
    }
    check_program(&program, &env).map_err(MaterializeError::Check)?;
    debug!(function = expected_name, "materialized");

    CompiledFunction::new(env, expected_name, limits).ok_or_else(|| {
        MaterializeError::MissingDefinition {
            expected: expected_name.to_string(),
        }
    })
}
