use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use super::error::{RuntimeError, RuntimeResult};
use super::interpreter::{Closure, ExecutionLimits, FunctionDef, Interpreter};
use super::value::{Callable, Value};
use crate::ast::{Function, Param};
use crate::schema::RecordSchema;

/// Global names visible to synthesized code: record constructors and the
/// top-level functions of the compiled source.
#[derive(Default)]
pub struct Environment {
    records: BTreeMap<String, Arc<RecordSchema>>,
    functions: HashMap<String, Arc<Closure>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = Arc<RecordSchema>>) -> Self {
        let mut env = Self::new();
        for record in records {
            env.add_record(record);
        }
        env
    }

    pub fn add_record(&mut self, schema: Arc<RecordSchema>) {
        self.records.insert(schema.name.clone(), schema);
    }

    pub fn record(&self, name: &str) -> Option<&Arc<RecordSchema>> {
        self.records.get(name)
    }

    pub fn records(&self) -> impl Iterator<Item = &Arc<RecordSchema>> {
        self.records.values()
    }

    pub fn define_function(&mut self, function: &Function) {
        let closure = Closure::new(Arc::new(FunctionDef::from_ast(function)), HashMap::new());
        self.functions.insert(function.name.clone(), Arc::new(closure));
    }

    pub fn function(&self, name: &str) -> Option<&Arc<Closure>> {
        self.functions.get(name)
    }

    /// Names the checker treats as globally bound.
    pub fn global_names(&self) -> impl Iterator<Item = &str> {
        self.records
            .keys()
            .chain(self.functions.keys())
            .map(String::as_str)
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(closure) = self.functions.get(name) {
            return Some(Value::Callable(Callable::Function(Arc::clone(closure))));
        }
        self.records
            .get(name)
            .map(|schema| Value::Callable(Callable::RecordType(Arc::clone(schema))))
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("records", &self.records.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Native stack reserved per level of dialect call depth.
const STACK_PER_CALL: usize = 256 * 1024;
const BASE_STACK: usize = 4 * 1024 * 1024;

pub(crate) fn interpreter_stack_size(limits: ExecutionLimits) -> usize {
    limits
        .max_depth
        .saturating_mul(STACK_PER_CALL)
        .saturating_add(BASE_STACK)
}

/// An executable entry point produced from synthesized source.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    name: String,
    env: Arc<Environment>,
    entry: Arc<Closure>,
    limits: ExecutionLimits,
}

impl CompiledFunction {
    pub(crate) fn new(env: Environment, name: &str, limits: ExecutionLimits) -> Option<Self> {
        let entry = Arc::clone(env.function(name)?);
        Some(Self {
            name: name.to_string(),
            env: Arc::new(env),
            entry,
            limits,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        self.entry.params()
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    /// Runs the entry point on a dedicated thread whose stack is sized for
    /// `max_depth` nested dialect calls, so the depth limit trips before the
    /// native stack does.
    pub fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> RuntimeResult<Value> {
        let stack_size = interpreter_stack_size(self.limits);
        std::thread::scope(|scope| {
            let worker = std::thread::Builder::new()
                .name(format!("conjure-{}", self.name))
                .stack_size(stack_size)
                .spawn_scoped(scope, || self.call_on_current_thread(args, kwargs))
                .map_err(|err| RuntimeError::Host(format!("could not start interpreter thread: {err}")))?;
            match worker.join() {
                Ok(result) => result,
                Err(payload) => std::panic::resume_unwind(payload),
            }
        })
    }

    fn call_on_current_thread(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> RuntimeResult<Value> {
        let mut interpreter = Interpreter::new(&self.env, self.limits);
        let entry = Value::Callable(Callable::Function(Arc::clone(&self.entry)));
        interpreter.call_value(&entry, args, kwargs)
    }
}
