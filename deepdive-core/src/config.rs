//! Configuration system for Deepdive.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/deepdive/config.toml` and/or
//! `.deepdive/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::research::output::OutputFormat;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub research: ResearchConfig,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name. Only "gemini" is supported.
    pub provider: String,
    /// Default model identifier.
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Inline API key. Takes precedence over `api_key_env` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Default temperature for generation.
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 8192,
            temperature: 0.7,
        }
    }
}

impl LlmConfig {
    /// Validate this LLM config and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.provider != "gemini" {
            warnings.push(format!(
                "provider '{}' is not supported; falling back to gemini",
                self.provider
            ));
        }
        if self.temperature < 0.0 || self.temperature > 2.0 {
            warnings.push(format!(
                "temperature ({}) is outside the typical range 0.0–2.0",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            warnings.push("max_tokens is 0; every response will be empty".to_string());
        }
        warnings
    }
}

/// Chat assistant configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model override for chat. Uses `llm.model` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// System instruction fixed at session creation.
    pub system_instruction: String,
    /// Reply shown when the remote call fails.
    pub fallback_reply: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: None,
            system_instruction: "You are a friendly, knowledgeable research assistant. \
                Answer in the language the user writes in, keep answers concise, \
                and say so plainly when you are unsure."
                .to_string(),
            fallback_reply: "Sorry, something went wrong. Please try again.".to_string(),
        }
    }
}

/// Research pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Model override for research calls. Uses `llm.model` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Maximum number of search+evaluate rounds per run.
    pub max_iterations: usize,
    /// Bounds on the number of plan items requested from the planner.
    pub min_plan_items: usize,
    pub max_plan_items: usize,
    /// Bounds on the number of refined queries requested per iteration.
    pub min_refined_queries: usize,
    pub max_refined_queries: usize,
    /// Language the final report is written in.
    pub report_language: String,
    /// Default report output format for the CLI.
    pub output_format: OutputFormat,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_iterations: 3,
            min_plan_items: 3,
            max_plan_items: 5,
            min_refined_queries: 2,
            max_refined_queries: 3,
            report_language: "English".to_string(),
            output_format: OutputFormat::Markdown,
        }
    }
}

impl ResearchConfig {
    /// Validate this research config and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_iterations == 0 {
            warnings.push(
                "max_iterations is 0; one search round will still run before synthesis"
                    .to_string(),
            );
        }
        if self.min_plan_items > self.max_plan_items {
            warnings.push(format!(
                "min_plan_items ({}) > max_plan_items ({})",
                self.min_plan_items, self.max_plan_items
            ));
        }
        if self.min_refined_queries > self.max_refined_queries {
            warnings.push(format!(
                "min_refined_queries ({}) > max_refined_queries ({})",
                self.min_refined_queries, self.max_refined_queries
            ));
        }
        warnings
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "deepdive", "deepdive")
}

/// Path of the user-level config file, if a home directory can be resolved.
pub fn user_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".deepdive").join("config.toml")
}

/// Load configuration by merging all layers.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `DEEPDIVE_`)
/// 3. Workspace-local config (`.deepdive/config.toml`)
/// 4. User config (`~/.config/deepdive/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&AppConfig>,
) -> Result<AppConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // DEEPDIVE_LLM__MODEL, DEEPDIVE_RESEARCH__MAX_ITERATIONS, etc.
    figment = figment.merge(Env::prefixed("DEEPDIVE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Check whether any Deepdive configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

/// Write the default configuration to `.deepdive/config.toml` in the workspace.
///
/// Refuses to overwrite an existing file. Returns the path written.
pub fn write_default_config(workspace: &Path) -> Result<PathBuf, crate::error::DeepdiveError> {
    let path = workspace_config_path(workspace);
    if path.exists() {
        return Err(crate::error::ConfigError::Invalid {
            message: format!("{} already exists", path.display()),
        }
        .into());
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let body = toml::to_string_pretty(&AppConfig::default()).map_err(|e| {
        crate::error::ConfigError::ParseError {
            message: e.to_string(),
        }
    })?;
    std::fs::write(&path, body)?;
    Ok(path)
}
