//! Brain module — LLM provider abstraction and interaction.
//!
//! Defines the `LlmProvider` trait for model-agnostic completions and the
//! `Brain` wrapper that layers structured generation and grounded search on
//! top of it. Also provides `MockLlmProvider` for tests.

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, Source, TokenUsage};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Trait for LLM providers.
///
/// A single `complete` call covers the three capabilities Deepdive needs:
/// multi-turn text, schema-constrained JSON output, and search grounding.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the default model name.
    fn model_name(&self) -> &str;
}

/// Wraps a provider with per-call defaults and usage accounting.
pub struct Brain {
    provider: Arc<dyn LlmProvider>,
    temperature: f32,
    max_tokens: Option<usize>,
    usage: Mutex<TokenUsage>,
}

impl Brain {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
            usage: Mutex::new(TokenUsage::default()),
        }
    }

    /// Total tokens consumed through this brain so far.
    pub fn total_usage(&self) -> TokenUsage {
        self.usage.lock().map(|u| *u).unwrap_or_default()
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Send a request, filling in defaults the caller left unset.
    pub async fn complete(
        &self,
        mut request: CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        request.temperature = self.temperature;
        if request.max_tokens.is_none() {
            request.max_tokens = self.max_tokens;
        }
        debug!(
            model = request.model.as_deref().unwrap_or(self.provider.model_name()),
            messages = request.messages.len(),
            structured = request.response_schema.is_some(),
            grounding = request.grounding,
            "Sending completion request"
        );
        let response = self.provider.complete(request).await?;
        if let Ok(mut usage) = self.usage.lock() {
            usage.accumulate(&response.usage);
        }
        Ok(response)
    }

    /// Multi-turn text completion.
    pub async fn converse(
        &self,
        messages: Vec<Message>,
        model: Option<String>,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest {
            messages,
            ..Default::default()
        }
        .with_model(model);
        let response = self.complete(request).await?;
        Ok(response.message.text)
    }

    /// One-shot structured generation.
    ///
    /// The response text must be JSON deserializable into `T`; anything else
    /// is reported as `LlmError::MalformedOutput` naming `expected`.
    pub async fn generate_structured<T: DeserializeOwned>(
        &self,
        system: &str,
        prompt: &str,
        schema: serde_json::Value,
        expected: &str,
        model: Option<String>,
    ) -> Result<T, LlmError> {
        let request = CompletionRequest::single_turn(system, prompt)
            .with_schema(schema)
            .with_model(model);
        let response = self.complete(request).await?;
        parse_structured(response.text(), expected)
    }

    /// Grounded web-search generation. Returns the text and its citations.
    pub async fn grounded_search(
        &self,
        system: &str,
        query: &str,
        model: Option<String>,
    ) -> Result<(String, Vec<Source>), LlmError> {
        let request = CompletionRequest::single_turn(system, query)
            .with_grounding()
            .with_model(model);
        let response = self.complete(request).await?;
        Ok((response.message.text, response.sources))
    }
}

/// Parse a structured model response.
///
/// Tolerates a surrounding ```json fence, which some models emit even in
/// JSON mode.
pub fn parse_structured<T: DeserializeOwned>(text: &str, expected: &str) -> Result<T, LlmError> {
    let trimmed = strip_code_fence(text.trim());
    if trimmed.is_empty() {
        return Err(LlmError::MalformedOutput {
            expected: expected.to_string(),
            message: "empty response".to_string(),
        });
    }
    serde_json::from_str(trimmed).map_err(|e| LlmError::MalformedOutput {
        expected: expected.to_string(),
        message: e.to_string(),
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

type MockHandler =
    Box<dyn Fn(&CompletionRequest) -> Result<CompletionResponse, LlmError> + Send + Sync>;

/// A mock LLM provider for testing.
///
/// Queued responses are returned first, in order. Once the queue is empty the
/// optional handler answers; without one a canned text reply is returned.
/// Every request is recorded.
pub struct MockLlmProvider {
    model: String,
    responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    handler: Option<MockHandler>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            responses: Mutex::new(VecDeque::new()),
            handler: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer requests that find the queue empty with `handler`.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<CompletionResponse, LlmError> + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::new()
        }
    }

    /// Queue a response to be returned by the next `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error to be returned by the next `complete` call.
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of grounded (search) requests received so far.
    pub fn grounded_request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.grounding)
            .count()
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::model(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("STOP".to_string()),
            sources: Vec::new(),
        }
    }

    /// Create a JSON response for structured-generation tests.
    pub fn json_response(value: serde_json::Value) -> CompletionResponse {
        Self::text_response(&value.to_string())
    }

    /// Create a grounded response carrying citations.
    pub fn grounded_response(text: &str, sources: Vec<Source>) -> CompletionResponse {
        CompletionResponse {
            sources,
            ..Self::text_response(text)
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            return next;
        }
        match &self.handler {
            Some(handler) => handler(&request),
            None => Ok(MockLlmProvider::text_response(
                "I'm a mock LLM. No queued responses available.",
            )),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pair {
        a: u32,
        b: String,
    }

    fn brain(provider: Arc<MockLlmProvider>) -> Brain {
        Brain::new(provider, &LlmConfig::default())
    }

    #[test]
    fn test_parse_structured_plain() {
        let pair: Pair = parse_structured(r#"{"a": 1, "b": "x"}"#, "pair").unwrap();
        assert_eq!(
            pair,
            Pair {
                a: 1,
                b: "x".into()
            }
        );
    }

    #[test]
    fn test_parse_structured_fenced() {
        let pair: Pair = parse_structured("```json\n{\"a\": 2, \"b\": \"y\"}\n```", "pair").unwrap();
        assert_eq!(pair.a, 2);
    }

    #[test]
    fn test_parse_structured_missing_field() {
        let err = parse_structured::<Pair>(r#"{"a": 1}"#, "pair").unwrap_err();
        match err {
            LlmError::MalformedOutput { expected, message } => {
                assert_eq!(expected, "pair");
                assert!(message.contains("b"));
            }
            other => panic!("Expected MalformedOutput, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_structured_empty() {
        let err = parse_structured::<Pair>("   ", "pair").unwrap_err();
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn test_generate_structured_sends_schema() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_response(MockLlmProvider::json_response(
            serde_json::json!({"a": 7, "b": "z"}),
        ));
        let brain = brain(provider.clone());

        let pair: Pair = brain
            .generate_structured(
                "sys",
                "prompt",
                serde_json::json!({"type": "object"}),
                "pair",
                None,
            )
            .await
            .unwrap();
        assert_eq!(pair.a, 7);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].response_schema.is_some());
        assert!(!requests[0].grounding);
    }

    #[tokio::test]
    async fn test_grounded_search_returns_sources() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_response(MockLlmProvider::grounded_response(
            "result",
            vec![Source::new("https://a.example", "A")],
        ));
        let brain = brain(provider.clone());

        let (text, sources) = brain.grounded_search("sys", "q", None).await.unwrap();
        assert_eq!(text, "result");
        assert_eq!(sources.len(), 1);
        assert_eq!(provider.grounded_request_count(), 1);
    }

    #[tokio::test]
    async fn test_usage_accumulates() {
        let provider = Arc::new(MockLlmProvider::new());
        let brain = brain(provider);
        brain.converse(vec![Message::user("hi")], None).await.unwrap();
        brain.converse(vec![Message::user("again")], None).await.unwrap();
        assert_eq!(brain.total_usage().total(), 300);
    }

    #[tokio::test]
    async fn test_mock_queue_then_handler() {
        let provider = MockLlmProvider::with_handler(|_| Ok(MockLlmProvider::text_response("h")));
        provider.queue_error(LlmError::Connection {
            message: "down".into(),
        });
        let first = provider.complete(CompletionRequest::default()).await;
        assert!(first.is_err());
        let second = provider.complete(CompletionRequest::default()).await.unwrap();
        assert_eq!(second.text(), "h");
        assert_eq!(provider.request_count(), 2);
    }
}
