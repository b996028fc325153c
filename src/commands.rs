use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{Config, get_config_dir, run_interactive_config, show_config};
use crate::database::ConversationStore;
use crate::pipeline::{CorpusHandle, Ingestor, RagPipeline};
use crate::providers;

fn load_config() -> Result<Config> {
    let config_dir = get_config_dir().context("Failed to locate configuration directory")?;
    Config::load(&config_dir)
}

fn index_location(config: &Config, index: Option<PathBuf>) -> PathBuf {
    index.unwrap_or_else(|| config.index_path())
}

/// Edit the configuration interactively, or print it with `show`
#[inline]
pub fn config_command(show: bool) -> Result<()> {
    if show {
        let config = load_config()?;
        show_config(&config)
    } else {
        let config_dir = get_config_dir().context("Failed to locate configuration directory")?;
        run_interactive_config(&config_dir)
    }
}

/// Build a fresh index from `directory` and persist it
#[inline]
pub async fn ingest_command(directory: &Path, index: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let index_path = index_location(&config, index);

    info!("Ingesting documents from {}", directory.display());
    let (embedder, _) = providers::from_config(&config)?;
    let ingestor = Ingestor::new(embedder, config.chunking, config.retrieval.metric);

    let dir = directory.to_path_buf();
    let outcome = tokio::task::spawn_blocking(move || ingestor.ingest(&dir))
        .await
        .context("Ingestion task did not complete")?
        .with_context(|| format!("Failed to ingest {}", directory.display()))?;

    for warning in &outcome.warnings {
        println!("{} {}", style("warning:").yellow(), warning);
    }

    outcome
        .corpus
        .save(&index_path)
        .with_context(|| format!("Failed to save index to {}", index_path.display()))?;

    println!(
        "{} {} chunks from {} documents",
        style("Indexed").green().bold(),
        outcome.chunks,
        outcome.documents
    );
    if !outcome.warnings.is_empty() {
        println!("  Skipped files: {}", outcome.warnings.len());
    }
    println!("  Index: {}", index_path.display());

    Ok(())
}

/// Answer a question from a previously ingested index
#[inline]
pub async fn ask_command(question: &str, index: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let index_path = index_location(&config, index);

    let corpus = CorpusHandle::load(&index_path, config.embedding_dimension()).with_context(|| {
        format!(
            "Failed to load index from {}. Run 'docqa ingest <dir>' first.",
            index_path.display()
        )
    })?;
    let pipeline = RagPipeline::from_config(&config)
        .await
        .context("Failed to set up question answering")?;

    let response = pipeline.ask(question, &corpus).await?;

    println!("{}", response.answer);
    println!();
    if response.source_document_names.is_empty() {
        println!("{}", style("No source documents matched.").dim());
    } else {
        println!(
            "{} {}",
            style("Sources:").bold(),
            response.source_document_names.join(", ")
        );
    }
    println!(
        "{}",
        style(format!("Saved as conversation {}", response.record_id)).dim()
    );

    Ok(())
}

async fn open_store() -> Result<ConversationStore> {
    let config = load_config()?;
    let store = ConversationStore::initialize_from_config_dir(config.get_base_dir())
        .await
        .context("Failed to open conversation history")?;
    Ok(store)
}

/// List every stored conversation, oldest first
#[inline]
pub async fn history_command() -> Result<()> {
    let store = open_store().await?;
    let summaries = store.summaries().await?;

    if summaries.is_empty() {
        println!("No conversations yet.");
        println!("Use 'docqa ask <question>' to start one.");
        return Ok(());
    }

    println!("Conversations ({} total):", summaries.len());
    for summary in &summaries {
        println!("  {} {}", style(format!("[{}]", summary.id)).cyan(), summary);
    }

    Ok(())
}

/// Print one stored conversation in full
#[inline]
pub async fn show_command(id: i64) -> Result<()> {
    let store = open_store().await?;
    let record = store.get(id).await?;

    println!("{}", style(&record.name).bold().cyan());
    let when = record.local_timestamp().map_or_else(
        || record.timestamp.clone(),
        |local| local.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
    );
    println!("{}", style(when).dim());
    println!();
    println!("{} {}", style("Q:").bold(), record.question);
    println!("{} {}", style("A:").bold(), record.answer);
    if !record.source_document_names.is_empty() {
        println!();
        println!(
            "{} {}",
            style("Sources:").bold(),
            record.source_document_names.join(", ")
        );
    }

    Ok(())
}

#[inline]
pub async fn delete_command(id: i64) -> Result<()> {
    let store = open_store().await?;
    store.delete(id).await?;
    println!("Conversation {} deleted", id);
    Ok(())
}
