
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};

use super::{AzureConfig, Config, ConfigError, OllamaConfig, ProviderKind};
use crate::index::DistanceMetric;
use crate::providers::OllamaClient;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 docqa Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    let providers = [ProviderKind::Ollama, ProviderKind::Azure];
    let provider_index = Select::new()
        .with_prompt("Embedding and chat provider")
        .default(
            providers
                .iter()
                .position(|p| *p == config.provider)
                .unwrap_or(0),
        )
        .items(&["Ollama (local)", "Azure OpenAI"])
        .interact()?;
    config.provider = providers[provider_index];

    eprintln!();
    match config.provider {
        ProviderKind::Ollama => {
            eprintln!("{}", style("Ollama Configuration").bold().yellow());
            eprintln!("Configure your local Ollama instance for embeddings and answers.");
            eprintln!();

            configure_ollama(&mut config.ollama)?;

            eprintln!();
            eprintln!("{}", style("Testing configuration...").yellow());

            match check_ollama(&config) {
                Ok(()) => {
                    eprintln!("{}", style("✓ Ollama connection successful!").green());
                }
                Err(e) => {
                    eprintln!(
                        "{}",
                        style("⚠ Warning: Ollama is not ready").yellow()
                    );
                    eprintln!("  {:#}", e);
                    eprintln!(
                        "You can continue, but make sure Ollama is running and both models are pulled before ingesting."
                    );
                }
            }
        }
        ProviderKind::Azure => {
            eprintln!("{}", style("Azure OpenAI Configuration").bold().yellow());
            eprintln!("Values left blank can be supplied through OPENAI_* environment variables.");
            eprintln!();

            configure_azure(&mut config.azure)?;
        }
    }

    eprintln!();
    eprintln!("{}", style("Retrieval").bold().yellow());
    configure_retrieval(&mut config)?;

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();
    eprintln!("Provider: {}", style(config.provider).cyan());
    eprintln!();

    match config.provider {
        ProviderKind::Ollama => {
            eprintln!("{}", style("Ollama Settings:").bold().yellow());
            eprintln!("  Host: {}", style(&config.ollama.host).cyan());
            eprintln!("  Port: {}", style(config.ollama.port).cyan());
            eprintln!(
                "  Embedding Model: {}",
                style(&config.ollama.embedding_model).cyan()
            );
            eprintln!("  Chat Model: {}", style(&config.ollama.chat_model).cyan());
            eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
            match config.ollama_url() {
                Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
                Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
            }
        }
        ProviderKind::Azure => {
            eprintln!("{}", style("Azure OpenAI Settings:").bold().yellow());
            eprintln!("  Endpoint: {}", style(&config.azure.endpoint).cyan());
            eprintln!(
                "  API Key: {}",
                style(masked_api_key(&config.azure.api_key)).cyan()
            );
            eprintln!("  API Version: {}", style(&config.azure.api_version).cyan());
            eprintln!(
                "  Embedding Deployment: {} ({})",
                style(&config.azure.embedding_deployment).cyan(),
                config.azure.embedding_model
            );
            eprintln!(
                "  Chat Deployment: {} ({})",
                style(&config.azure.chat_deployment).cyan(),
                config.azure.chat_model
            );
        }
    }
    eprintln!(
        "  Embedding Dimension: {}",
        style(config.embedding_dimension()).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.k).cyan());
    eprintln!("  Metric: {}", style(config.retrieval.metric).cyan());
    match config.retrieval.score_threshold {
        Some(threshold) => eprintln!("  Score Threshold: {}", style(threshold).cyan()),
        None => eprintln!("  Score Threshold: {}", style("none").dim()),
    }

    eprintln!();
    eprintln!("Config file: {}", style(config.config_file_path().display()).dim());
    eprintln!("Index file: {}", style(config.index_path().display()).dim());
    eprintln!("History: {}", style(config.database_path().display()).dim());

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    if config_dir.join("config.toml").exists() {
        let config = Config::load(config_dir)?;
        eprintln!("{}", style("Found existing configuration.").green());
        Ok(config)
    } else {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        Ok(Config {
            base_dir: config_dir.to_path_buf(),
            ..Config::default()
        })
    }
}

/// Show only enough of a key to recognise it
fn masked_api_key(api_key: &str) -> String {
    let chars: Vec<char> = api_key.chars().collect();
    if chars.is_empty() {
        "(not set)".to_string()
    } else if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{}", tail)
    }
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let embedding_dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(ollama.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(ollama.chat_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_embedding_model(embedding_model)?;
    ollama.set_embedding_dimension(embedding_dimension)?;
    ollama.set_chat_model(chat_model)?;
    ollama.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_azure(azure: &mut AzureConfig) -> Result<()> {
    azure.endpoint = Input::new()
        .with_prompt("Endpoint (https://<resource>.openai.azure.com)")
        .default(azure.endpoint.clone())
        .allow_empty(true)
        .interact_text()?;

    let api_key = Password::new()
        .with_prompt("API key (leave blank to keep current)")
        .allow_empty_password(true)
        .interact()?;
    if !api_key.trim().is_empty() {
        azure.api_key = api_key;
    }

    azure.api_version = Input::new()
        .with_prompt("API version")
        .default(azure.api_version.clone())
        .validate_with(non_empty)
        .interact_text()?;

    azure.embedding_deployment = Input::new()
        .with_prompt("Embedding deployment name")
        .default(azure.embedding_deployment.clone())
        .allow_empty(true)
        .interact_text()?;

    azure.embedding_model = Input::new()
        .with_prompt("Embedding model name")
        .default(azure.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    azure.chat_deployment = Input::new()
        .with_prompt("Chat deployment name")
        .default(azure.chat_deployment.clone())
        .allow_empty(true)
        .interact_text()?;

    azure.chat_model = Input::new()
        .with_prompt("Chat model name")
        .default(azure.chat_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    Ok(())
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    config.retrieval.k = Input::new()
        .with_prompt("Chunks retrieved per question")
        .default(config.retrieval.k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Must be between 1 and 100")
            }
        })
        .interact_text()?;

    let metrics = DistanceMetric::ALL;
    let metric_index = Select::new()
        .with_prompt("Distance metric")
        .default(
            metrics
                .iter()
                .position(|m| *m == config.retrieval.metric)
                .unwrap_or(0),
        )
        .items(&metrics)
        .interact()?;
    config.retrieval.metric = metrics[metric_index];

    let threshold: String = Input::new()
        .with_prompt("Minimum similarity (blank for none)")
        .default(
            config
                .retrieval
                .score_threshold
                .map(|t| t.to_string())
                .unwrap_or_default(),
        )
        .allow_empty(true)
        .validate_with(|input: &String| -> Result<(), &str> {
            parse_threshold(input).map(|_| ())
        })
        .interact_text()?;
    config.retrieval.score_threshold = parse_threshold(&threshold).map_err(anyhow::Error::msg)?;

    Ok(())
}

fn parse_threshold(input: &str) -> Result<Option<f32>, &'static str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err("Must be a number"),
    }
}

fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Value cannot be empty")
    } else {
        Ok(())
    }
}

/// Reach the configured server and confirm both models are pulled
fn check_ollama(config: &Config) -> Result<()> {
    OllamaClient::new(config)?
        .with_timeout(Duration::from_secs(5))
        .health_check()
}
