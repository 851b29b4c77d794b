//! LLM provider implementations.
//!
//! Use `create_provider()` to instantiate the provider named in config.
//! When no credential is available, callers fall back to
//! `UnconfiguredProvider`, which fails every call with the original reason.

pub mod gemini;

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse};
use async_trait::async_trait;
use std::sync::Arc;

pub use gemini::GeminiProvider;

/// Create the LLM provider described by `config`.
///
/// Unknown provider names fall back to Gemini with a warning.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.provider.as_str() {
        "gemini" | "google" => Ok(Arc::new(GeminiProvider::new(config)?)),
        other => {
            tracing::warn!(
                provider = other,
                "Unknown LLM provider, falling back to gemini"
            );
            Ok(Arc::new(GeminiProvider::new(config)?))
        }
    }
}

/// Stand-in provider used when startup could not obtain a credential.
///
/// Every call fails with `LlmError::AuthFailed`, so a research run fails on
/// its first remote call.
pub struct UnconfiguredProvider {
    reason: String,
    model: String,
}

impl UnconfiguredProvider {
    pub fn new(reason: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for UnconfiguredProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::AuthFailed {
            provider: self.reason.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_missing_key() {
        let config = LlmConfig {
            api_key_env: "DD_TEST_PROVIDER_ABSENT_KEY".into(),
            ..LlmConfig::default()
        };
        // SAFETY: test-only env var manipulation
        unsafe { std::env::remove_var("DD_TEST_PROVIDER_ABSENT_KEY") };
        assert!(matches!(
            create_provider(&config),
            Err(LlmError::AuthFailed { .. })
        ));
    }

    #[test]
    fn test_create_provider_with_inline_key() {
        let config = LlmConfig {
            api_key: Some("inline".into()),
            ..LlmConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn test_unconfigured_provider_fails_every_call() {
        let provider = UnconfiguredProvider::new("GEMINI_API_KEY not set", "gemini-2.5-flash");
        let err = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }
}
