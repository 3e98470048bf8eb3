//! Turning a stub into a compiled implementation, with retries.

pub mod client;
pub mod implementation;
pub mod source;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

pub use client::{CompletionClient, CompletionRequest, OpenAiClient, TransportError};
pub use implementation::{Implementation, SynthesisStats};
pub use source::{reassemble, strip_code_fence};

use crate::config::SynthConfig;
use crate::prompt::compose_prompt;
use crate::runtime::{materialize, CompiledFunction, Environment, MaterializeError};
use crate::stub::{introspect, render_signature, FunctionStub, ResolveError, StubSignature};
use crate::utils::errors::render_diagnostics;

/// Why a single attempt was rejected.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("failed to generate implementation for {function} after {attempts} attempts")]
    Exhausted {
        function: String,
        attempts: u32,
        #[source]
        source: AttemptError,
    },
}

/// Drives the prompt → completion → materialize loop for one stub at a time.
#[derive(Clone)]
pub struct Synthesizer {
    client: Arc<dyn CompletionClient>,
    config: SynthConfig,
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer")
            .field("model", &self.config.model)
            .field("retry_limit", &self.config.retry_limit)
            .finish_non_exhaustive()
    }
}

impl Synthesizer {
    pub fn new(client: Arc<dyn CompletionClient>, config: SynthConfig) -> Self {
        Self { client, config }
    }

    /// A synthesizer talking to the configured OpenAI-compatible endpoint.
    pub fn openai(config: SynthConfig) -> Self {
        let client = OpenAiClient::new(config.api_base.clone(), config.api_key.clone());
        Self::new(Arc::new(client), config)
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn synthesize(&self, stub: &FunctionStub) -> Result<Implementation, SynthesisError> {
        let name = stub.name();
        let signature = introspect(stub)?;
        let prompt = compose_prompt(stub)?;
        let rendered_signature = render_signature(stub);
        info!(function = name, "prompt for {name}:\n{prompt}");

        let started = Instant::now();
        let request = CompletionRequest {
            model: self.config.model.clone(),
            prompt: prompt.as_str().to_string(),
        };

        let limit = self.config.retry_limit.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(stub, &signature, &rendered_signature, &request) {
                Ok((function, source)) => {
                    info!(function = name, attempt, "accepted implementation for {name}");
                    return Ok(Implementation {
                        function,
                        source,
                        prompt,
                        stats: SynthesisStats {
                            attempts: attempt,
                            model: self.config.model.clone(),
                            synthesized_at: Utc::now(),
                            elapsed: started.elapsed(),
                        },
                    });
                }
                Err(err) => {
                    warn!(
                        function = name,
                        attempt,
                        limit,
                        "attempt {attempt}/{limit} failed for {name}: {err}"
                    );
                    if attempt >= limit {
                        return Err(SynthesisError::Exhausted {
                            function: name.to_string(),
                            attempts: limit,
                            source: err,
                        });
                    }
                }
            }
            attempt += 1;
        }
    }

    fn attempt(
        &self,
        stub: &FunctionStub,
        signature: &StubSignature,
        rendered_signature: &str,
        request: &CompletionRequest,
    ) -> Result<(CompiledFunction, String), AttemptError> {
        let raw = self.client.complete(request)?;
        let body = strip_code_fence(&raw);
        let source = reassemble(stub.name(), rendered_signature, stub.docstring(), &body);
        info!(function = stub.name(), "generated implementation for {}:\n{source}", stub.name());

        let env = Environment::with_records(signature.records.iter().cloned());
        match materialize(&source, stub.name(), env, self.config.limits) {
            Ok(function) => Ok((function, source)),
            Err(err) => {
                if self.config.diagnostics {
                    let source_id = format!("<{}>", stub.name());
                    let report = render_diagnostics(&err.diagnostics(&source_id), &source);
                    warn!(function = stub.name(), "diagnostics:\n{report}");
                }
                Err(err.into())
            }
        }
    }
}
