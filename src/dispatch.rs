//! The `ai_implement` surface: stubs that synthesize themselves on first call.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::cache::ImplementationCache;
use crate::config::{ConfigError, SynthConfig};
use crate::runtime::{RuntimeError, Value};
use crate::stub::{FunctionStub, StubKey};
use crate::synth::{Implementation, SynthesisError, SynthesisStats, Synthesizer};

#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("cannot convert result of `{function}`: {message}")]
    Convert { function: String, message: String },
}

/// Positional and keyword arguments forwarded to an implementation.
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keyword: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }
}

/// Builds [`Args`]: `args![1, 2]`, `args![1; b = 2]`, `args![; a = 1]`.
#[macro_export]
macro_rules! args {
    () => {
        $crate::dispatch::Args::new()
    };
    ($($value:expr),* ; $($key:ident = $kw:expr),* $(,)?) => {
        $crate::dispatch::Args::new()$(.arg($value))*$(.kwarg(stringify!($key), $kw))*
    };
    ($($value:expr),+ $(,)?) => {
        $crate::dispatch::Args::new()$(.arg($value))+
    };
}

static GLOBAL_SYNTHESIZER: OnceCell<Synthesizer> = OnceCell::new();

/// The process-wide synthesizer, configured from the environment on first use.
pub fn global_synthesizer() -> Result<&'static Synthesizer, ConfigError> {
    GLOBAL_SYNTHESIZER.get_or_try_init(|| SynthConfig::from_env().map(Synthesizer::openai))
}

/// Installs the synthesizer behind `ai_implement`, e.g. one with a different
/// completion client. Hands it back if the global one is already in place.
pub fn set_global_synthesizer(synthesizer: Synthesizer) -> Result<(), Synthesizer> {
    GLOBAL_SYNTHESIZER.set(synthesizer)
}

#[derive(Debug, Clone)]
enum CacheHandle {
    Global,
    Owned(Arc<ImplementationCache>),
}

impl CacheHandle {
    fn get(&self) -> &ImplementationCache {
        match self {
            CacheHandle::Global => ImplementationCache::global(),
            CacheHandle::Owned(cache) => cache,
        }
    }
}

/// A stub whose body is synthesized on its first call and cached afterwards.
#[derive(Debug, Clone)]
pub struct AiFunction {
    stub: FunctionStub,
    key: StubKey,
    synthesizer: Option<Synthesizer>,
    cache: CacheHandle,
}

/// Wraps `stub` with the global cache and the environment-configured synthesizer.
pub fn ai_implement(stub: FunctionStub) -> AiFunction {
    AiFunction {
        key: stub.key(),
        stub,
        synthesizer: None,
        cache: CacheHandle::Global,
    }
}

impl AiFunction {
    pub fn new(stub: FunctionStub, synthesizer: Synthesizer, cache: Arc<ImplementationCache>) -> Self {
        Self {
            key: stub.key(),
            stub,
            synthesizer: Some(synthesizer),
            cache: CacheHandle::Owned(cache),
        }
    }

    pub fn name(&self) -> &str {
        self.stub.name()
    }

    pub fn stub(&self) -> &FunctionStub {
        &self.stub
    }

    pub fn key(&self) -> &StubKey {
        &self.key
    }

    /// The cached implementation, synthesizing it if this is the first call.
    pub fn implementation(&self) -> Result<Arc<Implementation>, CallError> {
        self.cache.get().get_or_synthesize(&self.key, || -> Result<Implementation, CallError> {
            let synthesizer = match &self.synthesizer {
                Some(synthesizer) => synthesizer,
                None => global_synthesizer()?,
            };
            debug!(function = self.name(), key = %self.key, "cache miss");
            Ok(synthesizer.synthesize(&self.stub)?)
        })
    }

    pub fn call(&self, args: Args) -> Result<Value, CallError> {
        let implementation = self.implementation()?;
        Ok(implementation.call(args.positional, args.keyword)?)
    }

    /// Calls and converts the result through its JSON form.
    pub fn call_as<R: DeserializeOwned>(&self, args: Args) -> Result<R, CallError> {
        let value = self.call(args)?;
        let convert = |message: String| CallError::Convert {
            function: self.name().to_string(),
            message,
        };
        let json = value.to_json().map_err(|err| convert(err.to_string()))?;
        serde_json::from_value(json).map_err(|err| convert(err.to_string()))
    }

    /// Provenance of the cached implementation, if one exists.
    pub fn stats(&self) -> Option<SynthesisStats> {
        self.cache
            .get()
            .get(&self.key)
            .map(|implementation| implementation.stats.clone())
    }

    /// Drops the cached implementation so the next call synthesizes again.
    pub fn invalidate(&self) -> bool {
        self.cache.get().remove(&self.key).is_some()
    }
}
