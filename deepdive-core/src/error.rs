//! Error types for the Deepdive core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering LLM transport, malformed model output, configuration, and the
//! research pipeline.

use std::path::PathBuf;

/// Top-level error type for the Deepdive core library.
#[derive(Debug, thiserror::Error)]
pub enum DeepdiveError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Research error: {0}")]
    Research(#[from] ResearchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    /// The model answered, but its structured output did not match the
    /// requested schema.
    #[error("Malformed {expected} output: {message}")]
    MalformedOutput { expected: String, message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

impl LlmError {
    /// Whether this error came from the model's output rather than the transport.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            LlmError::MalformedOutput { .. } | LlmError::ResponseParse { .. }
        )
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from the research pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("A research run is already in progress")]
    AlreadyRunning,

    #[error("Research topic is empty")]
    EmptyTopic,

    #[error("{stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: LlmError,
    },

    #[error("Research run was reset")]
    Reset,
}

/// A type alias for results using the top-level `DeepdiveError`.
pub type Result<T> = std::result::Result<T, DeepdiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_llm() {
        let err = DeepdiveError::Llm(LlmError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = DeepdiveError::Config(ConfigError::EnvVarMissing {
            var: "GEMINI_API_KEY".into(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Environment variable not set: GEMINI_API_KEY"
        );
    }

    #[test]
    fn test_error_display_research_stage() {
        let err = ResearchError::Stage {
            stage: "synthesis",
            source: LlmError::MalformedOutput {
                expected: "report".into(),
                message: "missing field `title`".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "synthesis failed: Malformed report output: missing field `title`"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DeepdiveError = io_err.into();
        assert!(matches!(err, DeepdiveError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: DeepdiveError = serde_err.into();
        assert!(matches!(err, DeepdiveError::Serialization(_)));
    }

    #[test]
    fn test_malformed_classification() {
        assert!(
            LlmError::MalformedOutput {
                expected: "plan".into(),
                message: "x".into()
            }
            .is_malformed()
        );
        assert!(LlmError::ResponseParse { message: "x".into() }.is_malformed());
        assert!(!LlmError::RateLimited { retry_after_secs: 30 }.is_malformed());
    }
}
