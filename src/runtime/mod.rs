//! The generated-code dialect runtime: values, the checker and the interpreter.

pub mod builtins;
pub mod check;
pub mod environment;
pub mod error;
pub mod format;
pub mod interpreter;
pub mod materialize;
pub mod methods;
pub mod ops;
pub mod value;

pub use check::{check_program, CheckError};
pub use environment::{CompiledFunction, Environment};
pub use error::{RuntimeError, RuntimeResult};
pub use interpreter::{ExecutionLimits, Interpreter};
pub use materialize::{materialize, MaterializeError};
pub use value::{Callable, Dict, Value};
