//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use deepdive_core::providers::{UnconfiguredProvider, create_provider};
use deepdive_core::{AppConfig, Brain, LlmConfig, LlmError};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, warn};

/// Handle a chat or research subcommand with the loaded configuration.
pub async fn handle_command(command: Commands, config: AppConfig, quiet: bool) -> anyhow::Result<()> {
    for warning in config
        .llm
        .validate()
        .into_iter()
        .chain(config.research.validate())
    {
        warn!("Config: {warning}");
    }

    match command {
        Commands::Chat => {
            let brain = connect(&config.llm).ok();
            crate::repl::run_chat(config, brain).await
        }
        Commands::Research {
            topic,
            format,
            max_iterations,
        } => {
            let mut config = config;
            if let Some(format) = format {
                config.research.output_format = format;
            }
            if let Some(max_iterations) = max_iterations {
                config.research.max_iterations = max_iterations;
            }
            let brain = match connect(&config.llm) {
                Ok(brain) => brain,
                Err(e) => {
                    let provider = UnconfiguredProvider::new(e.to_string(), config.llm.model.clone());
                    Arc::new(Brain::new(Arc::new(provider), &config.llm))
                }
            };
            crate::research::run_research(&topic, config, brain, quiet).await
        }
        Commands::Config { action } => {
            anyhow::bail!("config {action:?} must be handled before loading configuration")
        }
    }
}

/// Create the configured provider. A missing credential is reported here.
fn connect(config: &LlmConfig) -> Result<Arc<Brain>, LlmError> {
    match create_provider(config) {
        Ok(provider) => Ok(Arc::new(Brain::new(provider, config))),
        Err(e) => {
            error!(
                "LLM provider init failed: {}. Set {} or llm.api_key in the config.",
                e, config.api_key_env
            );
            Err(e)
        }
    }
}

pub async fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = deepdive_core::config::workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            let path = deepdive_core::config::write_default_config(workspace)?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = deepdive_core::config::load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}
