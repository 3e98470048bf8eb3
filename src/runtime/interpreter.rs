use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use super::builtins;
use super::environment::Environment;
use super::error::{RuntimeError, RuntimeResult};
use super::format::apply_format_spec;
use super::methods;
use super::ops;
use super::value::{check_len, construct_record, Callable, Dict, Module, Value};
use crate::ast::{
    BinaryOp, Block, Comprehension, Expr, FStringPart, Function, Literal, LogicalOp, Param,
    Statement, Target,
};

/// Bounds on a single top-level call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub max_steps: u64,
    pub max_depth: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_depth: 128,
        }
    }
}

#[derive(Debug)]
pub enum FunctionBody {
    Block(Block),
    Expr(Expr),
}

#[derive(Debug)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: FunctionBody,
}

impl FunctionDef {
    pub fn from_ast(function: &Function) -> Self {
        Self {
            name: function.name.clone(),
            params: function.params.clone(),
            body: FunctionBody::Block(function.body.clone()),
        }
    }

    fn lambda(params: &[Param], body: &Expr) -> Self {
        Self {
            name: "<lambda>".to_string(),
            params: params.to_vec(),
            body: FunctionBody::Expr(body.clone()),
        }
    }
}

/// A function value together with the enclosing locals it saw when it was created.
#[derive(Debug)]
pub struct Closure {
    def: Arc<FunctionDef>,
    captured: Arc<HashMap<String, Value>>,
}

impl Closure {
    pub fn new(def: Arc<FunctionDef>, captured: HashMap<String, Value>) -> Self {
        Self {
            def,
            captured: Arc::new(captured),
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn params(&self) -> &[Param] {
        &self.def.params
    }
}

struct Frame {
    locals: HashMap<String, Value>,
    captured: Arc<HashMap<String, Value>>,
}

impl Frame {
    fn snapshot(&self) -> HashMap<String, Value> {
        let mut scope = (*self.captured).clone();
        scope.extend(self.locals.iter().map(|(k, v)| (k.clone(), v.clone())));
        scope
    }
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Tree-walking evaluator. One interpreter serves one top-level call so the
/// step budget covers everything that call does.
pub struct Interpreter<'env> {
    env: &'env Environment,
    limits: ExecutionLimits,
    steps: u64,
    depth: usize,
}

impl<'env> Interpreter<'env> {
    pub fn new(env: &'env Environment, limits: ExecutionLimits) -> Self {
        Self {
            env,
            limits,
            steps: 0,
            depth: 0,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn tick(&mut self) -> RuntimeResult<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(RuntimeError::StepLimitExceeded {
                limit: self.limits.max_steps,
            });
        }
        Ok(())
    }

    pub fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> RuntimeResult<Value> {
        self.tick()?;
        match callee {
            Value::Callable(Callable::Builtin(name)) => builtins::call(self, name, args, kwargs),
            Value::Callable(Callable::RecordType(schema)) => construct_record(schema, args, kwargs),
            Value::Callable(Callable::Function(closure)) => {
                self.call_closure(closure, args, kwargs)
            }
            Value::Callable(Callable::BoundMethod { receiver, name }) => {
                methods::call_method(self, receiver, name, args, kwargs)
            }
            other => Err(RuntimeError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_closure(
        &mut self,
        closure: &Arc<Closure>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> RuntimeResult<Value> {
        if self.depth >= self.limits.max_depth {
            return Err(RuntimeError::RecursionLimitExceeded {
                limit: self.limits.max_depth,
            });
        }

        let def = Arc::clone(&closure.def);
        let mut frame = Frame {
            locals: HashMap::new(),
            captured: Arc::clone(&closure.captured),
        };
        if def.name != "<lambda>" && !closure.captured.contains_key(&def.name) {
            frame.locals.insert(
                def.name.clone(),
                Value::Callable(Callable::Function(Arc::clone(closure))),
            );
        }
        self.bind_arguments(&def, &mut frame, args, kwargs)?;

        trace!(function = %def.name, depth = self.depth, "call");
        self.depth += 1;
        let result = match &def.body {
            FunctionBody::Block(block) => match self.exec_block(&mut frame, block) {
                Ok(Flow::Return(value)) => Ok(value),
                Ok(_) => Ok(Value::None),
                Err(err) => Err(err),
            },
            FunctionBody::Expr(expr) => self.eval(&mut frame, expr),
        };
        self.depth -= 1;
        result
    }

    fn bind_arguments(
        &mut self,
        def: &FunctionDef,
        frame: &mut Frame,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> RuntimeResult<()> {
        let name = &def.name;
        if args.len() > def.params.len() {
            return Err(RuntimeError::type_error(format!(
                "{name}() takes {} positional arguments but {} were given",
                def.params.len(),
                args.len()
            )));
        }

        let mut slots: Vec<Option<Value>> = vec![None; def.params.len()];
        for (slot, value) in slots.iter_mut().zip(args) {
            *slot = Some(value);
        }
        for (key, value) in kwargs {
            let index = def
                .params
                .iter()
                .position(|param| param.name == key)
                .ok_or_else(|| {
                    RuntimeError::type_error(format!(
                        "{name}() got an unexpected keyword argument '{key}'"
                    ))
                })?;
            if slots[index].is_some() {
                return Err(RuntimeError::type_error(format!(
                    "{name}() got multiple values for argument '{key}'"
                )));
            }
            slots[index] = Some(value);
        }

        let mut missing = Vec::new();
        for (param, slot) in def.params.iter().zip(slots) {
            let value = match (slot, &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval(frame, default)?,
                (None, None) => {
                    missing.push(format!("'{}'", param.name));
                    continue;
                }
            };
            frame.locals.insert(param.name.clone(), value);
        }
        if !missing.is_empty() {
            return Err(RuntimeError::type_error(format!(
                "{name}() missing {} required positional argument(s): {}",
                missing.len(),
                missing.join(", ")
            )));
        }
        Ok(())
    }

    fn lookup(&self, frame: &Frame, name: &str) -> RuntimeResult<Value> {
        if let Some(value) = frame.locals.get(name).or_else(|| frame.captured.get(name)) {
            return Ok(value.clone());
        }
        self.env
            .lookup(name)
            .or_else(|| builtins::lookup(name))
            .ok_or_else(|| RuntimeError::name_error(name))
    }

    fn exec_block(&mut self, frame: &mut Frame, block: &Block) -> RuntimeResult<Flow> {
        for statement in &block.statements {
            match self.exec(frame, statement)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_loop_body(&mut self, frame: &mut Frame, body: &Block) -> RuntimeResult<Option<Flow>> {
        match self.exec_block(frame, body)? {
            Flow::Break => Ok(Some(Flow::Normal)),
            Flow::Return(value) => Ok(Some(Flow::Return(value))),
            Flow::Normal | Flow::Continue => Ok(None),
        }
    }

    fn exec(&mut self, frame: &mut Frame, statement: &Statement) -> RuntimeResult<Flow> {
        self.tick()?;
        match statement {
            Statement::Expr(expr) => {
                self.eval(frame, expr)?;
            }
            Statement::Assign { targets, value } => {
                let value = self.eval(frame, value)?;
                for target in targets {
                    self.assign(frame, target, value.clone())?;
                }
            }
            Statement::AugAssign { target, op, value } => self.aug_assign(frame, target, *op, value)?,
            Statement::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(frame, expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            Statement::If {
                cond,
                then_block,
                elif_blocks,
                else_block,
            } => {
                if self.eval(frame, cond)?.truthy() {
                    return self.exec_block(frame, then_block);
                }
                for (cond, block) in elif_blocks {
                    if self.eval(frame, cond)?.truthy() {
                        return self.exec_block(frame, block);
                    }
                }
                if let Some(block) = else_block {
                    return self.exec_block(frame, block);
                }
            }
            Statement::While { cond, body } => {
                while self.eval(frame, cond)?.truthy() {
                    self.tick()?;
                    if let Some(flow) = self.exec_loop_body(frame, body)? {
                        return Ok(flow);
                    }
                }
            }
            Statement::For {
                target,
                iterable,
                body,
            } => {
                let iterable = self.eval(frame, iterable)?;
                for item in iterable.iter()? {
                    self.tick()?;
                    self.assign(frame, target, item)?;
                    if let Some(flow) = self.exec_loop_body(frame, body)? {
                        return Ok(flow);
                    }
                }
            }
            Statement::Break(_) => return Ok(Flow::Break),
            Statement::Continue(_) => return Ok(Flow::Continue),
            Statement::Pass => {}
            Statement::Raise(value) => return Err(self.raise(frame, value.as_ref())?),
            Statement::Import { module, alias, .. } => {
                let module = import_module(module)?;
                let name = alias.clone().unwrap_or_else(|| module.name().to_string());
                frame.locals.insert(name, Value::Module(module));
            }
            Statement::FromImport { module, names, .. } => {
                let module = import_module(module)?;
                for (name, alias) in names {
                    let value = builtins::module_member(module, name).ok_or_else(|| {
                        RuntimeError::exception(
                            "ImportError",
                            format!("cannot import name '{name}' from '{}'", module.name()),
                        )
                    })?;
                    frame
                        .locals
                        .insert(alias.clone().unwrap_or_else(|| name.clone()), value);
                }
            }
            Statement::Function(function) => {
                let closure = Closure::new(Arc::new(FunctionDef::from_ast(function)), frame.snapshot());
                frame.locals.insert(
                    function.name.clone(),
                    Value::Callable(Callable::Function(Arc::new(closure))),
                );
            }
        }
        Ok(Flow::Normal)
    }

    fn raise(&mut self, frame: &mut Frame, value: Option<&Expr>) -> RuntimeResult<RuntimeError> {
        let Some(expr) = value else {
            return Ok(RuntimeError::exception(
                "RuntimeError",
                "No active exception to reraise",
            ));
        };
        match self.eval(frame, expr)? {
            Value::Exception(exception) => Ok(RuntimeError::exception(
                exception.kind.clone(),
                exception.message.clone(),
            )),
            Value::Callable(Callable::Builtin(name)) if builtins::is_exception(name) => {
                Ok(RuntimeError::exception(name, ""))
            }
            other => Ok(RuntimeError::type_error(format!(
                "exceptions must derive from BaseException, not {}",
                other.type_name()
            ))),
        }
    }

    fn aug_assign(
        &mut self,
        frame: &mut Frame,
        target: &Target,
        op: BinaryOp,
        value: &Expr,
    ) -> RuntimeResult<()> {
        match target {
            Target::Name(ident) => {
                let current = self.lookup(frame, &ident.name)?;
                let rhs = self.eval(frame, value)?;
                let updated = in_place(op, &current, &rhs)?;
                frame.locals.insert(ident.name.clone(), updated);
            }
            Target::Attribute { object, attr, .. } => {
                let object = self.eval(frame, object)?;
                let current = methods::get_attribute(&object, attr)?;
                let rhs = self.eval(frame, value)?;
                let updated = in_place(op, &current, &rhs)?;
                methods::set_attribute(&object, attr, updated)?;
            }
            Target::Index { object, index } => {
                let object = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                let current = get_item(&object, &index)?;
                let rhs = self.eval(frame, value)?;
                let updated = in_place(op, &current, &rhs)?;
                set_item(&object, index, updated)?;
            }
            Target::Tuple(_) => {
                return Err(RuntimeError::exception(
                    "SyntaxError",
                    "illegal expression for augmented assignment",
                ));
            }
        }
        Ok(())
    }

    fn assign(&mut self, frame: &mut Frame, target: &Target, value: Value) -> RuntimeResult<()> {
        match target {
            Target::Name(ident) => {
                frame.locals.insert(ident.name.clone(), value);
            }
            Target::Attribute { object, attr, .. } => {
                let object = self.eval(frame, object)?;
                methods::set_attribute(&object, attr, value)?;
            }
            Target::Index { object, index } => {
                let object = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                set_item(&object, index, value)?;
            }
            Target::Tuple(targets) => {
                let items = value.to_vec()?;
                if items.len() != targets.len() {
                    let message = if items.len() > targets.len() {
                        format!("too many values to unpack (expected {})", targets.len())
                    } else {
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            targets.len(),
                            items.len()
                        )
                    };
                    return Err(RuntimeError::value_error(message));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(frame, target, item)?;
                }
            }
        }
        Ok(())
    }

    fn eval_all(&mut self, frame: &mut Frame, exprs: &[Expr]) -> RuntimeResult<Vec<Value>> {
        exprs.iter().map(|expr| self.eval(frame, expr)).collect()
    }

    fn eval(&mut self, frame: &mut Frame, expr: &Expr) -> RuntimeResult<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Int(value) => Value::Int(*value),
                Literal::Float(value) => Value::Float(*value),
                Literal::Str(text) => Value::str(text),
                Literal::Bool(value) => Value::Bool(*value),
                Literal::None => Value::None,
            }),
            Expr::Name(ident) => self.lookup(frame, &ident.name),
            Expr::FString(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        FStringPart::Text(text) => out.push_str(text),
                        FStringPart::Expr {
                            expr,
                            conversion,
                            spec,
                        } => {
                            let value = self.eval(frame, expr)?;
                            let value = match conversion {
                                Some('r') | Some('a') => Value::str(value.repr()),
                                Some(_) => Value::str(value.to_display()),
                                None => value,
                            };
                            out.push_str(&apply_format_spec(&value, spec.as_deref().unwrap_or(""))?);
                        }
                    }
                }
                Ok(Value::str(out))
            }
            Expr::List(items) => Ok(Value::list(self.eval_all(frame, items)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_all(frame, items)?)),
            Expr::Set(items) => {
                let items = self.eval_all(frame, items)?;
                Value::set(items)
            }
            Expr::Dict(pairs) => {
                let mut dict = Dict::new();
                for (key, value) in pairs {
                    let key = self.eval(frame, key)?;
                    let value = self.eval(frame, value)?;
                    dict.insert(key, value)?;
                }
                Ok(Value::dict(dict))
            }
            Expr::ListComp { element, clauses } => {
                let mut out = Vec::new();
                self.comprehension(frame, clauses, &mut |interp, frame| {
                    out.push(interp.eval(frame, element)?);
                    Ok(())
                })?;
                Ok(Value::list(out))
            }
            Expr::SetComp { element, clauses } => {
                let mut out = Vec::new();
                self.comprehension(frame, clauses, &mut |interp, frame| {
                    out.push(interp.eval(frame, element)?);
                    Ok(())
                })?;
                Value::set(out)
            }
            Expr::DictComp {
                key,
                value,
                clauses,
            } => {
                let mut dict = Dict::new();
                self.comprehension(frame, clauses, &mut |interp, frame| {
                    let key = interp.eval(frame, key)?;
                    let value = interp.eval(frame, value)?;
                    dict.insert(key, value)
                })?;
                Ok(Value::dict(dict))
            }
            Expr::Lambda { params, body } => {
                let closure = Closure::new(Arc::new(FunctionDef::lambda(params, body)), frame.snapshot());
                Ok(Value::Callable(Callable::Function(Arc::new(closure))))
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(frame, operand)?;
                ops::unary(*op, &operand)
            }
            Expr::Binary { left, op, right } => {
                let left = self.eval(frame, left)?;
                let right = self.eval(frame, right)?;
                ops::binary(*op, &left, &right)
            }
            Expr::Compare { left, rest } => {
                let mut current = self.eval(frame, left)?;
                for (op, right) in rest {
                    let right = self.eval(frame, right)?;
                    if !ops::compare(*op, &current, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    current = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Logical { left, op, right } => {
                let left = self.eval(frame, left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(frame, right)
                }
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(frame, cond)?.truthy() {
                    self.eval(frame, then)
                } else {
                    self.eval(frame, otherwise)
                }
            }
            Expr::Attribute { object, attr, .. } => {
                let object = self.eval(frame, object)?;
                methods::get_attribute(&object, attr)
            }
            Expr::Index { object, index } => {
                let object = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                get_item(&object, &index)
            }
            Expr::Slice {
                object,
                start,
                stop,
                step,
            } => {
                let object = self.eval(frame, object)?;
                let start = self.eval_bound(frame, start.as_deref())?;
                let stop = self.eval_bound(frame, stop.as_deref())?;
                let step = self.eval_bound(frame, step.as_deref())?;
                slice(&object, start, stop, step)
            }
            Expr::Call {
                func, args, kwargs, ..
            } => {
                if let Expr::Attribute { object, attr, .. } = func.as_ref() {
                    let receiver = self.eval(frame, object)?;
                    let (args, kwargs) = self.eval_arguments(frame, args, kwargs)?;
                    self.tick()?;
                    return match receiver {
                        Value::Module(module) => {
                            let callee = methods::get_attribute(&Value::Module(module), attr)?;
                            self.call_value(&callee, args, kwargs)
                        }
                        receiver => methods::call_method(self, &receiver, attr, args, kwargs),
                    };
                }
                let callee = self.eval(frame, func)?;
                let (args, kwargs) = self.eval_arguments(frame, args, kwargs)?;
                self.call_value(&callee, args, kwargs)
            }
        }
    }

    fn eval_arguments(
        &mut self,
        frame: &mut Frame,
        args: &[Expr],
        kwargs: &[(String, Expr)],
    ) -> RuntimeResult<(Vec<Value>, Vec<(String, Value)>)> {
        let args = self.eval_all(frame, args)?;
        let mut evaluated = Vec::with_capacity(kwargs.len());
        for (name, expr) in kwargs {
            evaluated.push((name.clone(), self.eval(frame, expr)?));
        }
        Ok((args, evaluated))
    }

    fn eval_bound(&mut self, frame: &mut Frame, bound: Option<&Expr>) -> RuntimeResult<Option<i64>> {
        let Some(expr) = bound else {
            return Ok(None);
        };
        match self.eval(frame, expr)? {
            Value::None => Ok(None),
            value => value.as_int().map(Some).ok_or_else(|| {
                RuntimeError::type_error(
                    "slice indices must be integers or None or have an __index__ method",
                )
            }),
        }
    }

    /// Runs the clauses of a comprehension, calling `emit` for every surviving binding.
    /// Loop variables do not leak: any outer binding they shadow is restored afterwards.
    fn comprehension(
        &mut self,
        frame: &mut Frame,
        clauses: &[Comprehension],
        emit: &mut dyn FnMut(&mut Self, &mut Frame) -> RuntimeResult<()>,
    ) -> RuntimeResult<()> {
        let names: Vec<String> = clauses
            .iter()
            .flat_map(|clause| clause.target.bound_names())
            .map(|ident| ident.name.clone())
            .collect();
        let saved: Vec<(String, Option<Value>)> = names
            .iter()
            .map(|name| (name.clone(), frame.locals.get(name).cloned()))
            .collect();

        let result = self.comprehension_clause(frame, clauses, emit);

        for (name, previous) in saved {
            match previous {
                Some(value) => frame.locals.insert(name, value),
                None => frame.locals.remove(&name),
            };
        }
        result
    }

    fn comprehension_clause(
        &mut self,
        frame: &mut Frame,
        clauses: &[Comprehension],
        emit: &mut dyn FnMut(&mut Self, &mut Frame) -> RuntimeResult<()>,
    ) -> RuntimeResult<()> {
        let Some((clause, rest)) = clauses.split_first() else {
            return emit(self, frame);
        };
        let iterable = self.eval(frame, &clause.iterable)?;
        'items: for item in iterable.iter()? {
            self.tick()?;
            self.assign(frame, &clause.target, item)?;
            for condition in &clause.conditions {
                if !self.eval(frame, condition)?.truthy() {
                    continue 'items;
                }
            }
            self.comprehension_clause(frame, rest, emit)?;
        }
        Ok(())
    }
}

fn import_module(name: &str) -> RuntimeResult<Module> {
    match name {
        "math" => Ok(Module::Math),
        other => Err(RuntimeError::exception(
            "ModuleNotFoundError",
            format!("No module named '{other}'"),
        )),
    }
}

/// `+=` on a list extends it in place; everything else rebinds.
fn in_place(op: BinaryOp, current: &Value, rhs: &Value) -> RuntimeResult<Value> {
    match (op, current) {
        (BinaryOp::Add, Value::List(list)) => {
            let items = rhs.to_vec()?;
            let mut target = list.write();
            check_len(target.len().saturating_add(items.len()))?;
            target.extend(items);
            drop(target);
            Ok(current.clone())
        }
        _ => ops::binary(op, current, rhs),
    }
}

fn sequence_index(index: &Value, len: usize, kind: &str) -> RuntimeResult<usize> {
    let raw = index.as_int().ok_or_else(|| {
        RuntimeError::type_error(format!(
            "{kind} indices must be integers, not {}",
            index.type_name()
        ))
    })?;
    let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
    let adjusted = if raw < 0 { raw + signed_len } else { raw };
    if adjusted < 0 || adjusted >= signed_len {
        return Err(RuntimeError::index_error(format!("{kind} index out of range")));
    }
    Ok(adjusted as usize)
}

pub(crate) fn get_item(object: &Value, index: &Value) -> RuntimeResult<Value> {
    match object {
        Value::List(items) => {
            let items = items.read_recursive();
            let position = sequence_index(index, items.len(), "list")?;
            Ok(items[position].clone())
        }
        Value::Tuple(items) => {
            let position = sequence_index(index, items.len(), "tuple")?;
            Ok(items[position].clone())
        }
        Value::Str(text) => {
            let len = text.chars().count();
            let position = sequence_index(index, len, "string")?;
            Ok(text
                .chars()
                .nth(position)
                .map(|ch| Value::str(ch.to_string()))
                .unwrap_or(Value::None))
        }
        Value::Dict(dict) => dict
            .read_recursive()
            .get(index)?
            .ok_or_else(|| RuntimeError::key_error(index.repr())),
        Value::Range { start, stop, step } => {
            let len = super::value::range_len(*start, *stop, *step);
            let position = sequence_index(index, len, "range object")?;
            Ok(Value::Int(start + step * position as i64))
        }
        other => Err(RuntimeError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn set_item(object: &Value, index: Value, value: Value) -> RuntimeResult<()> {
    match object {
        Value::List(items) => {
            let mut items = items.write();
            let position = sequence_index(&index, items.len(), "list assignment")?;
            items[position] = value;
            Ok(())
        }
        Value::Dict(dict) => dict.write().insert(index, value),
        other => Err(RuntimeError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

fn slice_positions(len: usize, start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<usize> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let clamp = |bound: i64, low: i64, high: i64| {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(low, high)
    };
    let mut positions = Vec::new();
    if step > 0 {
        let mut index = start.map_or(0, |s| clamp(s, 0, len));
        let end = stop.map_or(len, |s| clamp(s, 0, len));
        while index < end {
            positions.push(index as usize);
            index += step;
        }
    } else {
        let mut index = start.map_or(len - 1, |s| clamp(s, -1, len - 1));
        let end = stop.map_or(-1, |s| clamp(s, -1, len - 1));
        while index > end {
            positions.push(index as usize);
            index += step;
        }
    }
    positions
}

fn slice(object: &Value, start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> RuntimeResult<Value> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(RuntimeError::value_error("slice step cannot be zero"));
    }
    match object {
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let positions = slice_positions(chars.len(), start, stop, step);
            Ok(Value::str(positions.into_iter().map(|i| chars[i]).collect::<String>()))
        }
        Value::List(items) => {
            let items = items.read_recursive();
            let positions = slice_positions(items.len(), start, stop, step);
            Ok(Value::list(positions.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Tuple(items) => {
            let positions = slice_positions(items.len(), start, stop, step);
            Ok(Value::tuple(positions.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Range { .. } => {
            let items = object.to_vec()?;
            let positions = slice_positions(items.len(), start, stop, step);
            Ok(Value::list(positions.into_iter().map(|i| items[i].clone()).collect()))
        }
        other => Err(RuntimeError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_follow_python_bounds() {
        assert_eq!(slice_positions(5, None, None, 1), vec![0, 1, 2, 3, 4]);
        assert_eq!(slice_positions(5, Some(-2), None, 1), vec![3, 4]);
        assert_eq!(slice_positions(5, None, None, -1), vec![4, 3, 2, 1, 0]);
        assert_eq!(slice_positions(5, Some(1), Some(100), 2), vec![1, 3]);
        assert_eq!(slice_positions(5, Some(10), Some(-10), -2), vec![4, 2, 0]);
        assert!(slice_positions(0, None, None, -1).is_empty());
    }

    #[test]
    fn list_augmented_add_mutates_in_place() {
        let list = Value::list(vec![Value::Int(1)]);
        let result = in_place(BinaryOp::Add, &list, &Value::tuple(vec![Value::Int(2)]))
            .expect("extend");
        assert_eq!(list, Value::list(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(result, list);
    }

    #[test]
    fn indexing_reports_python_errors() {
        let list = Value::list(vec![Value::Int(1)]);
        assert_eq!(get_item(&list, &Value::Int(-1)).expect("last"), Value::Int(1));
        let err = get_item(&list, &Value::Int(3)).expect_err("out of range");
        assert_eq!(err.kind(), Some("IndexError"));
        let err = get_item(&Value::Int(3), &Value::Int(0)).expect_err("not subscriptable");
        assert_eq!(err.kind(), Some("TypeError"));
    }
}
