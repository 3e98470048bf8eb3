#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use conjure::cache::ImplementationCache;
use conjure::config::SynthConfig;
use conjure::synth::{CompletionClient, CompletionRequest, Synthesizer, TransportError};

/// Replays canned completions in order; the last one repeats once the script runs out.
pub struct ScriptedClient {
    responses: Vec<Result<String, String>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Arc<Self> {
        Arc::new(Self {
            responses: responses.into_iter().map(|r| Ok(r.into())).collect(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// A client whose every request fails at the transport level.
    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            responses: vec![Err(message.to_string())],
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl CompletionClient for ScriptedClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(request.prompt.clone());
        let response = self
            .responses
            .get(index)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_else(|| Err("no scripted response".to_string()));
        response.map_err(TransportError::Transport)
    }
}

pub fn config(retry_limit: u32) -> SynthConfig {
    SynthConfig::default()
        .with_retry_limit(retry_limit)
        .expect("positive retry limit")
}

pub fn synthesizer(client: &Arc<ScriptedClient>, retry_limit: u32) -> Synthesizer {
    Synthesizer::new(client.clone(), config(retry_limit))
}

pub fn fresh_cache() -> Arc<ImplementationCache> {
    Arc::new(ImplementationCache::new())
}
