//! Static screening of synthesized programs before they are accepted.
//!
//! The checker resolves every name against Python's function scoping rules,
//! restricts imports to `math` and rejects dunder attribute access so the
//! generated code stays inside the interpreter's model.

use std::collections::HashSet;

use thiserror::Error;

use super::builtins;
use super::environment::Environment;
use crate::ast::{Block, Comprehension, Expr, FStringPart, Function, Param, Program, Statement, Target};
use crate::lexer::Span;
use crate::utils::errors::{Diagnostic, DiagnosticSeverity};
use crate::utils::suggest::find_best_match;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CheckError {
    #[error("name `{name}` is not defined")]
    UndefinedName {
        name: String,
        span: Span,
        suggestion: Option<String>,
    },
    #[error("import of `{module}` is not allowed; only `math` is available")]
    DisallowedImport { module: String, span: Span },
    #[error("cannot import `{name}` from `math`")]
    UnknownMathMember { name: String, span: Span },
    #[error("access to `{attr}` is not allowed")]
    DunderAttribute { attr: String, span: Span },
    #[error("`{keyword}` outside loop")]
    LoopControlOutsideLoop { keyword: &'static str, span: Span },
}

impl CheckError {
    pub fn span(&self) -> Span {
        match self {
            CheckError::UndefinedName { span, .. }
            | CheckError::DisallowedImport { span, .. }
            | CheckError::UnknownMathMember { span, .. }
            | CheckError::DunderAttribute { span, .. }
            | CheckError::LoopControlOutsideLoop { span, .. } => *span,
        }
    }

    pub fn to_diagnostic(&self, source_id: &str) -> Diagnostic {
        let diagnostic = Diagnostic::new(
            DiagnosticSeverity::Error,
            source_id,
            self.span(),
            self.to_string(),
        );
        match self {
            CheckError::UndefinedName {
                suggestion: Some(suggestion),
                ..
            } => diagnostic.with_suggestion(suggestion.clone()),
            _ => diagnostic,
        }
    }
}

/// Checks every function of `program` against the globals of `env`.
pub fn check_program(program: &Program, env: &Environment) -> Result<(), Vec<CheckError>> {
    let mut checker = Checker {
        env,
        scopes: Vec::new(),
        loop_depth: 0,
        errors: Vec::new(),
    };
    for function in program.functions() {
        checker.function(function);
    }
    if checker.errors.is_empty() {
        Ok(())
    } else {
        Err(checker.errors)
    }
}

struct Checker<'a> {
    env: &'a Environment,
    scopes: Vec<HashSet<String>>,
    loop_depth: usize,
    errors: Vec<CheckError>,
}

impl Checker<'_> {
    fn function(&mut self, function: &Function) {
        self.defaults(&function.params);
        let mut scope: HashSet<String> = function.params.iter().map(|p| p.name.clone()).collect();
        collect_bindings(&function.body, &mut scope);
        scope.insert(function.name.clone());

        let saved_depth = std::mem::replace(&mut self.loop_depth, 0);
        self.scopes.push(scope);
        self.block(&function.body);
        self.scopes.pop();
        self.loop_depth = saved_depth;
    }

    fn defaults(&mut self, params: &[Param]) {
        for param in params {
            if let Some(default) = &param.default {
                self.expr(default);
            }
        }
    }

    fn block(&mut self, block: &Block) {
        for statement in &block.statements {
            self.statement(statement);
        }
    }

    fn loop_body(&mut self, body: &Block) {
        self.loop_depth += 1;
        self.block(body);
        self.loop_depth -= 1;
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Expr(expr) => self.expr(expr),
            Statement::Assign { targets, value } => {
                self.expr(value);
                for target in targets {
                    self.target(target);
                }
            }
            Statement::AugAssign { target, value, .. } => {
                if let Target::Name(ident) = target {
                    self.resolve(&ident.name, ident.span);
                }
                self.target(target);
                self.expr(value);
            }
            Statement::Return(value) | Statement::Raise(value) => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            Statement::If {
                cond,
                then_block,
                elif_blocks,
                else_block,
            } => {
                self.expr(cond);
                self.block(then_block);
                for (cond, block) in elif_blocks {
                    self.expr(cond);
                    self.block(block);
                }
                if let Some(block) = else_block {
                    self.block(block);
                }
            }
            Statement::While { cond, body } => {
                self.expr(cond);
                self.loop_body(body);
            }
            Statement::For {
                target,
                iterable,
                body,
            } => {
                self.expr(iterable);
                self.target(target);
                self.loop_body(body);
            }
            Statement::Break(span) | Statement::Continue(span) if self.loop_depth == 0 => {
                let keyword = if matches!(statement, Statement::Break(_)) {
                    "break"
                } else {
                    "continue"
                };
                self.errors.push(CheckError::LoopControlOutsideLoop {
                    keyword,
                    span: *span,
                });
            }
            Statement::Break(_) | Statement::Continue(_) | Statement::Pass => {}
            Statement::Import { module, span, .. } => {
                self.import(module, *span);
            }
            Statement::FromImport {
                module,
                names,
                span,
            } => {
                if self.import(module, *span) {
                    for (name, _) in names {
                        if builtins::math_member(name).is_none() {
                            self.errors.push(CheckError::UnknownMathMember {
                                name: name.clone(),
                                span: *span,
                            });
                        }
                    }
                }
            }
            Statement::Function(function) => self.function(function),
        }
    }

    fn import(&mut self, module: &str, span: Span) -> bool {
        if module == "math" {
            return true;
        }
        self.errors.push(CheckError::DisallowedImport {
            module: module.to_string(),
            span,
        });
        false
    }

    fn target(&mut self, target: &Target) {
        match target {
            Target::Name(_) => {}
            Target::Attribute { object, attr, span } => {
                self.attribute(attr, *span);
                self.expr(object);
            }
            Target::Index { object, index } => {
                self.expr(object);
                self.expr(index);
            }
            Target::Tuple(items) => items.iter().for_each(|item| self.target(item)),
        }
    }

    fn attribute(&mut self, attr: &str, span: Span) {
        if attr.starts_with("__") && attr.ends_with("__") {
            self.errors.push(CheckError::DunderAttribute {
                attr: attr.to_string(),
                span,
            });
        }
    }

    fn comprehension(&mut self, clauses: &[Comprehension], body: &[&Expr]) {
        let mut scope = HashSet::new();
        for clause in clauses {
            for ident in clause.target.bound_names() {
                scope.insert(ident.name.clone());
            }
        }
        self.scopes.push(scope);
        for clause in clauses {
            self.expr(&clause.iterable);
            for condition in &clause.conditions {
                self.expr(condition);
            }
        }
        for expr in body {
            self.expr(expr);
        }
        self.scopes.pop();
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Name(ident) => self.resolve(&ident.name, ident.span),
            Expr::FString(parts) => {
                for part in parts {
                    if let FStringPart::Expr { expr, .. } = part {
                        self.expr(expr);
                    }
                }
            }
            Expr::List(items) | Expr::Tuple(items) | Expr::Set(items) => {
                items.iter().for_each(|item| self.expr(item));
            }
            Expr::Dict(pairs) => {
                for (key, value) in pairs {
                    self.expr(key);
                    self.expr(value);
                }
            }
            Expr::ListComp { element, clauses } | Expr::SetComp { element, clauses } => {
                self.comprehension(clauses, &[element.as_ref()]);
            }
            Expr::DictComp {
                key,
                value,
                clauses,
            } => self.comprehension(clauses, &[key.as_ref(), value.as_ref()]),
            Expr::Lambda { params, body } => {
                self.defaults(params);
                self.scopes
                    .push(params.iter().map(|param| param.name.clone()).collect());
                self.expr(body);
                self.scopes.pop();
            }
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Compare { left, rest } => {
                self.expr(left);
                rest.iter().for_each(|(_, right)| self.expr(right));
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                self.expr(then);
                self.expr(otherwise);
            }
            Expr::Attribute { object, attr, span } => {
                self.attribute(attr, *span);
                self.expr(object);
            }
            Expr::Index { object, index } => {
                self.expr(object);
                self.expr(index);
            }
            Expr::Slice {
                object,
                start,
                stop,
                step,
            } => {
                self.expr(object);
                for bound in [start, stop, step].into_iter().flatten() {
                    self.expr(bound);
                }
            }
            Expr::Call {
                func, args, kwargs, ..
            } => {
                self.expr(func);
                args.iter().for_each(|arg| self.expr(arg));
                kwargs.iter().for_each(|(_, value)| self.expr(value));
            }
        }
    }

    fn resolve(&mut self, name: &str, span: Span) {
        let bound = self.scopes.iter().rev().any(|scope| scope.contains(name))
            || self.env.lookup(name).is_some()
            || builtins::lookup(name).is_some();
        if bound {
            return;
        }

        let suggestion = if name == "math" {
            Some("add `import math` at the top of the function body".to_string())
        } else {
            let candidates: Vec<String> = self
                .scopes
                .iter()
                .flatten()
                .cloned()
                .chain(self.env.global_names().map(str::to_string))
                .chain(builtins::names().map(str::to_string))
                .collect();
            find_best_match(name, candidates).map(|candidate| format!("did you mean `{candidate}`?"))
        };
        self.errors.push(CheckError::UndefinedName {
            name: name.to_string(),
            span,
            suggestion,
        });
    }
}

/// Names assigned anywhere in `block` are local to the whole function, as in Python.
fn collect_bindings(block: &Block, scope: &mut HashSet<String>) {
    for statement in &block.statements {
        match statement {
            Statement::Assign { targets, .. } => {
                for target in targets {
                    scope.extend(target.bound_names().into_iter().map(|i| i.name.clone()));
                }
            }
            Statement::AugAssign { target, .. } => {
                scope.extend(target.bound_names().into_iter().map(|i| i.name.clone()));
            }
            Statement::For { target, body, .. } => {
                scope.extend(target.bound_names().into_iter().map(|i| i.name.clone()));
                collect_bindings(body, scope);
            }
            Statement::While { body, .. } => collect_bindings(body, scope),
            Statement::If {
                then_block,
                elif_blocks,
                else_block,
                ..
            } => {
                collect_bindings(then_block, scope);
                for (_, block) in elif_blocks {
                    collect_bindings(block, scope);
                }
                if let Some(block) = else_block {
                    collect_bindings(block, scope);
                }
            }
            Statement::Import { module, alias, .. } => {
                scope.insert(alias.clone().unwrap_or_else(|| module.clone()));
            }
            Statement::FromImport { names, .. } => {
                for (name, alias) in names {
                    scope.insert(alias.clone().unwrap_or_else(|| name.clone()));
                }
            }
            Statement::Function(function) => {
                scope.insert(function.name.clone());
            }
            _ => {}
        }
    }
}
