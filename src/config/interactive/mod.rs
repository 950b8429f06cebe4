
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::{Path, PathBuf};

use super::secrets::{COHERE_API_KEY, GROQ_API_KEY, PINECONE_API_KEY};
use super::{Config, ConfigError, KNOWN_CHAT_MODELS, Secrets};
use crate::embeddings::EmbeddingModel;
use crate::embeddings::chunking::ChunkingConfig;
use crate::llm::BUILTIN_TEMPLATES;
use crate::vector_store::{DistanceMetric, VectorBackend};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 pdf-rag Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Document").bold().yellow());
    configure_document(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Chunking").bold().yellow());
    configure_chunking(&mut config.chunking)?;

    eprintln!();
    eprintln!("{}", style("Embeddings").bold().yellow());
    configure_embedding(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Vector Store").bold().yellow());
    configure_vector_store(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Chat Model").bold().yellow());
    configure_llm(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Checking API keys...").yellow());
    let missing = missing_secrets(&config, &Secrets::from_env());
    if missing.is_empty() {
        eprintln!("{}", style("✓ All required API keys are set").green());
    } else {
        for name in &missing {
            eprintln!("{} {} is not set", style("⚠ Warning:").yellow(), name);
        }
        eprintln!("Set them in the environment or a .env file before running queries.");
    }

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
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Document:").bold().yellow());
    eprintln!("  Path: {}", style(config.document.path.display()).cyan());
    eprintln!(
        "  Chunking: {} chars, {} overlap, separator {:?}",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan(),
        config.chunking.separator
    );

    eprintln!();
    eprintln!("{}", style("Embeddings:").bold().yellow());
    eprintln!(
        "  Model: {} ({} dimensions)",
        style(config.embedding.model).cyan(),
        config.embedding.dimension()
    );
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());
    match config.embedding.base_url() {
        Ok(url) => eprintln!("  Endpoint: {}", style(url).cyan()),
        Err(e) => eprintln!("  Endpoint: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Vector Store:").bold().yellow());
    let store = &config.vector_store;
    eprintln!("  Backend: {}", style(store.backend).cyan());
    eprintln!(
        "  Index: {} (namespace {}, {} metric)",
        style(&store.index_name).cyan(),
        style(&store.namespace).cyan(),
        store.metric
    );
    eprintln!("  Top-K: {}", style(store.top_k).cyan());
    if store.backend == VectorBackend::Pinecone {
        eprintln!("  Serverless: {} / {}", store.cloud, store.region);
    }

    eprintln!();
    eprintln!("{}", style("Chat Model:").bold().yellow());
    eprintln!("  Model: {}", style(&config.llm.model).cyan());
    eprintln!("  Temperature: {}", style(config.llm.temperature).cyan());
    match &config.prompt.template_file {
        Some(file) => eprintln!("  Prompt: {}", style(file.display()).cyan()),
        None => eprintln!("  Prompt: {}", style(&config.prompt.template).cyan()),
    }
    eprintln!(
        "  Sessions: {} turns kept, {} sent with each question, persist = {}",
        config.session.max_turns, config.session.history_in_prompt, config.session.persist
    );

    let missing = missing_secrets(&config, &Secrets::from_env());
    eprintln!();
    if missing.is_empty() {
        eprintln!("API keys: {}", style("all set").green());
    } else {
        eprintln!("API keys: {} {}", style("missing").red(), missing.join(", "));
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

/// Environment variables the configured services need but that are unset
pub fn missing_secrets(config: &Config, secrets: &Secrets) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if secrets.cohere_api_key.is_none() {
        missing.push(COHERE_API_KEY);
    }
    if config.vector_store.backend == VectorBackend::Pinecone && secrets.pinecone_api_key.is_none()
    {
        missing.push(PINECONE_API_KEY);
    }
    if secrets.groq_api_key.is_none() {
        missing.push(GROQ_API_KEY);
    }
    missing
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    let existing = config_dir.join("config.toml").exists();
    Config::load(config_dir).map_or_else(
        |e| {
            eprintln!(
                "{} ({})",
                style("Existing configuration is invalid. Using defaults.").yellow(),
                e
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            if existing {
                eprintln!("{}", style("Found existing configuration.").green());
            } else {
                eprintln!(
                    "{}",
                    style("No existing configuration found. Using defaults.").yellow()
                );
            }
            Ok(config)
        },
    )
}

fn configure_document(config: &mut Config) -> Result<()> {
    let path: String = Input::new()
        .with_prompt("PDF to chat with")
        .default(config.document.path.display().to_string())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            if input.trim().is_empty() {
                Err(ConfigError::EmptyDocumentPath)
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    config.document.path = PathBuf::from(path.trim());
    Ok(())
}

fn configure_chunking(chunking: &mut ChunkingConfig) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100_000).contains(input) {
                Ok(())
            } else {
                Err("Chunk size must be between 1 and 100000")
            }
        })
        .interact_text()?;

    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(chunking.chunk_overlap.min(chunk_size - 1))
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input < chunk_size {
                Ok(())
            } else {
                Err("Overlap must be smaller than the chunk size")
            }
        })
        .interact_text()?;

    chunking.chunk_size = chunk_size;
    chunking.chunk_overlap = chunk_overlap;
    chunking.validate()?;
    Ok(())
}

fn configure_embedding(config: &mut Config) -> Result<()> {
    let labels: Vec<String> = EmbeddingModel::ALL
        .iter()
        .map(|model| format!("{} ({} dimensions)", model, model.dimension()))
        .collect();
    let default_index = EmbeddingModel::ALL
        .iter()
        .position(|&m| m == config.embedding.model)
        .unwrap_or(0);

    let model_index = Select::new()
        .with_prompt("Cohere embedding model")
        .default(default_index)
        .items(&labels)
        .interact()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Texts per embedding request")
        .default(config.embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (1..=96).contains(input) {
                Ok(())
            } else {
                Err("Batch size must be between 1 and 96")
            }
        })
        .interact_text()?;

    config.embedding.model = EmbeddingModel::ALL[model_index];
    config.embedding.set_batch_size(batch_size)?;
    Ok(())
}

fn configure_vector_store(config: &mut Config) -> Result<()> {
    let store = &mut config.vector_store;

    let backend_index = Select::new()
        .with_prompt("Vector store backend")
        .default(
            VectorBackend::ALL
                .iter()
                .position(|&b| b == store.backend)
                .unwrap_or(0),
        )
        .items(&VectorBackend::ALL)
        .interact()?;
    store.backend = VectorBackend::ALL[backend_index];

    let index_name: String = Input::new()
        .with_prompt("Index name")
        .default(store.index_name.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let mut candidate = super::VectorStoreConfig::default();
            candidate.set_index_name(input.clone())
        })
        .interact_text()?;

    let namespace: String = Input::new()
        .with_prompt("Namespace")
        .default(store.namespace.clone())
        .interact_text()?;

    let metric_index = Select::new()
        .with_prompt("Distance metric")
        .default(
            DistanceMetric::ALL
                .iter()
                .position(|&m| m == store.metric)
                .unwrap_or(0),
        )
        .items(&DistanceMetric::ALL)
        .interact()?;

    let top_k: usize = Input::new()
        .with_prompt("Chunks retrieved per question (top-k)")
        .default(store.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Top-k must be between 1 and 100")
            }
        })
        .interact_text()?;

    store.set_index_name(index_name)?;
    store.set_namespace(namespace)?;
    store.metric = DistanceMetric::ALL[metric_index];
    store.set_top_k(top_k)?;

    if store.backend == VectorBackend::Pinecone {
        store.cloud = Input::new()
            .with_prompt("Serverless cloud")
            .default(store.cloud.clone())
            .interact_text()?;
        store.region = Input::new()
            .with_prompt("Serverless region")
            .default(store.region.clone())
            .interact_text()?;
    }

    Ok(())
}

fn configure_llm(config: &mut Config) -> Result<()> {
    let mut choices: Vec<&str> = KNOWN_CHAT_MODELS.to_vec();
    if !choices.contains(&config.llm.model.as_str()) {
        choices.push(&config.llm.model);
    }
    let default_index = choices
        .iter()
        .position(|&m| m == config.llm.model)
        .unwrap_or(0);

    let model_index = Select::new()
        .with_prompt("Groq chat model")
        .default(default_index)
        .items(&choices)
        .interact()?;
    let model = choices[model_index].to_string();

    let temperature: f32 = Input::new()
        .with_prompt("Sampling temperature")
        .default(config.llm.temperature)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (0.0..=2.0).contains(input) {
                Ok(())
            } else {
                Err("Temperature must be between 0.0 and 2.0")
            }
        })
        .interact_text()?;

    let template_index = Select::new()
        .with_prompt("Prompt template")
        .default(
            BUILTIN_TEMPLATES
                .iter()
                .position(|&t| t == config.prompt.template)
                .unwrap_or(0),
        )
        .items(BUILTIN_TEMPLATES)
        .interact()?;

    config.llm.set_model(model)?;
    config.llm.set_temperature(temperature)?;
    config.prompt.template = BUILTIN_TEMPLATES[template_index].to_string();
    Ok(())
}
