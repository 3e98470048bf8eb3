//! Function stubs whose bodies are written by a language model on first call.
//!
//! A [`FunctionStub`] declares a name, typed parameters, a return type and a
//! docstring. [`ai_implement`] wraps it so the first call composes a prompt,
//! asks the completion service for a body, compiles that body into the
//! sandboxed dialect interpreter and caches the result under the stub's
//! declaration site.

pub mod ast;
pub mod cache;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod lexer;
pub mod manifest;
pub mod parser;
pub mod prompt;
pub mod runtime;
pub mod schema;
pub mod stub;
pub mod synth;
pub mod utils;

pub use cache::{CacheStats, ImplementationCache};
pub use config::{ConfigError, SynthConfig};
pub use dispatch::{ai_implement, AiFunction, Args, CallError};
pub use prompt::{compose_prompt, Prompt};
pub use runtime::{RuntimeError, Value};
pub use schema::{FieldSchema, Record, RecordSchema, TypeRef};
pub use stub::{DeclarationSite, FieldInfo, FunctionStub, Metadata, Param, StubKey, TypeHint};
pub use synth::{
    CompletionClient, CompletionRequest, Implementation, SynthesisError, SynthesisStats,
    Synthesizer, TransportError,
};
