//! The remote completion collaborator.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("completion service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error("could not decode completion response: {0}")]
    Decode(String),
    #[error("completion response contained no text")]
    EmptyResponse,
}

/// Anything that turns a prompt into completion text.
pub trait CompletionClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError>;
}

impl<C: CompletionClient + ?Sized> CompletionClient for std::sync::Arc<C> {
    fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        (**self).complete(request)
    }
}

/// Blocking client for OpenAI-compatible `chat/completions` endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    agent: ureq::Agent,
    api_base: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_base", &self.api_base)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(30))
            .timeout_read(Duration::from_secs(300))
            .build();
        Self {
            agent,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

impl CompletionClient for OpenAiClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(TransportError::MissingApiKey)?;

        let body = serde_json::to_string(&ChatRequest {
            model: &request.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        })
        .map_err(|err| TransportError::Decode(err.to_string()))?;

        let endpoint = self.endpoint();
        debug!(%endpoint, model = %request.model, "sending completion request");
        let response = self
            .agent
            .post(&endpoint)
            .set("Authorization", &format!("Bearer {api_key}"))
            .set("Content-Type", "application/json")
            .send_string(&body)
            .map_err(|err| match err {
                ureq::Error::Status(status, response) => TransportError::Status {
                    status,
                    body: response.into_string().unwrap_or_default(),
                },
                ureq::Error::Transport(transport) => {
                    TransportError::Transport(transport.to_string())
                }
            })?;

        let text = response
            .into_string()
            .map_err(|err| TransportError::Transport(err.to_string()))?;
        parse_response(&text)
    }
}

fn parse_response(text: &str) -> Result<String, TransportError> {
    let response: ChatResponse =
        serde_json::from_str(text).map_err(|err| TransportError::Decode(err.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(TransportError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_choice_content_is_returned() {
        let text = r#"{"choices":[{"message":{"role":"assistant","content":"return a + b"}},{"message":{"content":"other"}}]}"#;
        assert_eq!(parse_response(text).expect("content"), "return a + b");
    }

    #[test]
    fn missing_content_is_an_empty_response() {
        let text = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(matches!(parse_response(text), Err(TransportError::EmptyResponse)));
        assert!(matches!(parse_response(r#"{"choices":[]}"#), Err(TransportError::EmptyResponse)));
        assert!(matches!(parse_response("not json"), Err(TransportError::Decode(_))));
    }

    #[test]
    fn missing_key_fails_before_any_request() {
        let client = OpenAiClient::new("http://127.0.0.1:9/v1/", None);
        assert_eq!(client.endpoint(), "http://127.0.0.1:9/v1/chat/completions");
        let request = CompletionRequest {
            model: "gpt-5-mini".into(),
            prompt: "hi".into(),
        };
        assert!(matches!(
            client.complete(&request),
            Err(TransportError::MissingApiKey)
        ));
    }
}
