//! # Deepdive Core
//!
//! Core library for the Deepdive research assistant.
//! Provides the LLM interface (brain), the Gemini provider, the chat session,
//! the bilingual research pipeline, configuration, and fundamental types.

pub mod brain;
pub mod chat;
pub mod config;
pub mod error;
pub mod providers;
pub mod research;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{Brain, LlmProvider, MockLlmProvider};
pub use chat::ChatSession;
pub use config::{AppConfig, ChatConfig, LlmConfig, ResearchConfig};
pub use error::{ConfigError, DeepdiveError, LlmError, ResearchError, Result};
pub use providers::{GeminiProvider, UnconfiguredProvider, create_provider};
pub use research::{
    OutputFormat, ResearchCallback, ResearchEngine, ResearchEvent, ResearchReport, ResearchStage,
    ResearchState,
};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, Source, TokenUsage};
