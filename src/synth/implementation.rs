use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::prompt::Prompt;
use crate::runtime::{CompiledFunction, RuntimeResult, Value};

/// Provenance of a synthesized implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisStats {
    /// The 1-based attempt that produced the accepted body.
    pub attempts: u32,
    pub model: String,
    pub synthesized_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// A compiled, callable body together with the text it came from.
#[derive(Debug, Clone)]
pub struct Implementation {
    pub function: CompiledFunction,
    pub source: String,
    pub prompt: Prompt,
    pub stats: SynthesisStats,
}

impl Implementation {
    pub fn name(&self) -> &str {
        self.function.name()
    }

    pub fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> RuntimeResult<Value> {
        self.function.call(args, kwargs)
    }
}
