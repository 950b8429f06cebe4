use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, Secrets, resolve_config_dir};
use crate::database::Database;
use crate::ingest::IngestOutcome;
use crate::pipeline::Pipeline;
use crate::session::{ChatSession, ChatTurn};

const EXIT_WORDS: &[&str] = &["exit", "quit", ":q"];

/// Load the configuration, applying the `--document` override
#[inline]
pub fn load_config(config_dir: Option<&Path>, document: Option<PathBuf>) -> Result<Config> {
    let config_dir = resolve_config_dir(config_dir)?;
    let mut config = Config::load(&config_dir)
        .with_context(|| format!("Failed to load configuration from {}", config_dir.display()))?;

    if let Some(document) = document {
        config.document.path = document;
    }

    Ok(config)
}

async fn open_pipeline(config: Config, secrets: &Secrets) -> Result<Pipeline> {
    Pipeline::from_config(config, secrets)
        .await
        .context("Failed to initialize the RAG pipeline")
}

fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Make sure the index holds the current document before answering
async fn prepare(pipeline: &Pipeline) -> Result<()> {
    let bar = spinner(format!(
        "Preparing index for {}",
        pipeline.document_path().display()
    ));
    let report = pipeline.provision(false).await;
    bar.finish_and_clear();

    let report = report.context("Failed to provision the vector index")?;
    if report.outcome == IngestOutcome::Ingested {
        eprintln!(
            "{} {} chunks from {} pages",
            style("Indexed").green(),
            report.chunks,
            report.pages
        );
    }
    Ok(())
}

/// Ingest the configured document
pub async fn ingest_document(config: Config, secrets: &Secrets, force: bool) -> Result<()> {
    let pipeline = open_pipeline(config, secrets).await?;
    let document = pipeline.document_path().to_path_buf();

    let bar = spinner(format!("Ingesting {}", document.display()));
    let report = pipeline.provision(force).await;
    bar.finish_and_clear();

    let report = report.with_context(|| format!("Failed to ingest {}", document.display()))?;

    match report.outcome {
        IngestOutcome::Skipped => {
            println!(
                "{} is already indexed (ingestion {}).",
                document.display(),
                report.ingestion_id
            );
            println!("Use 'pdf-rag ingest --force' to rebuild the index.");
        }
        IngestOutcome::Ingested => {
            println!("{}", style("✓ Ingestion complete").green());
            println!("  Document: {}", document.display());
            println!("  Pages: {}", report.pages);
            println!("  Chunks: {}", report.chunks);
            println!("  Records written: {}", report.written);
            println!("  Fingerprint: {}", style(short_fingerprint(&report.fingerprint)).dim());
        }
    }

    Ok(())
}

/// Answer a single question
pub async fn ask_question(
    config: Config,
    secrets: &Secrets,
    question: &str,
    json: bool,
) -> Result<()> {
    let pipeline = open_pipeline(config, secrets).await?;
    prepare(&pipeline).await?;

    let mut chain = pipeline.chain();
    let bar = spinner("Thinking...");
    let response = chain.invoke(question).await;
    bar.finish_and_clear();

    let response = response.context("Failed to answer the question")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("Failed to serialize response")?
        );
        return Ok(());
    }

    println!("{}", response.answer);
    println!();
    println!("{}", style("Sources:").bold());
    for result in &response.context {
        println!(
            "  page {} (score {:.3}) {}",
            result.metadata.page,
            result.score,
            style(preview(&result.metadata.text, 80)).dim()
        );
    }

    Ok(())
}

/// Print the chunks most similar to `query`
pub async fn search_document(
    mut config: Config,
    secrets: &Secrets,
    query: &str,
    k: Option<usize>,
) -> Result<()> {
    if let Some(k) = k {
        config
            .vector_store
            .set_top_k(k)
            .context("Invalid number of chunks requested")?;
    }

    let pipeline = open_pipeline(config, secrets).await?;
    prepare(&pipeline).await?;

    let k = pipeline.retriever().top_k();
    let results = pipeline
        .retriever()
        .retrieve_k(query, k)
        .await
        .context("Search failed")?;

    if results.is_empty() {
        println!("No matching chunks found.");
        return Ok(());
    }

    println!("Top {} chunks for {:?}:", results.len(), query);
    println!();
    for (rank, result) in results.iter().enumerate() {
        println!(
            "{}. {} page {}, chunk {} (score {:.4})",
            rank + 1,
            style(&result.metadata.source).cyan(),
            result.metadata.page,
            result.metadata.chunk_index,
            result.score
        );
        println!("   {}", preview(&result.metadata.text, 200));
        println!();
    }

    Ok(())
}

/// Interactive chat loop with history
pub async fn chat(config: Config, secrets: &Secrets, resume: Option<String>) -> Result<()> {
    let session_config = config.session.clone();
    let pipeline = open_pipeline(config, secrets).await?;
    prepare(&pipeline).await?;

    let database = session_config
        .persist
        .then(|| pipeline.database().clone());

    let mut session = match resume {
        Some(id) => {
            let database = database.context("Resuming a chat requires session.persist = true")?;
            ChatSession::resume(database, &id, session_config.max_turns).await?
        }
        None => {
            let title = pipeline
                .document_path()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            ChatSession::start(database, session_config.max_turns, title.as_deref()).await?
        }
    };

    eprintln!(
        "{}",
        style(format!("💬 Chatting with {}", pipeline.document_path().display()))
            .bold()
            .cyan()
    );
    if session.is_persistent() {
        eprintln!(
            "Session {} (resume with 'pdf-rag chat --resume {}')",
            style(session.conversation().id()).cyan(),
            session.conversation().id()
        );
    }
    eprintln!("Type 'exit' or an empty line to leave.");
    eprintln!();

    if !session.conversation().is_empty() {
        print!("{}", session.conversation().transcript(None));
    }

    let mut chain = pipeline.chain();

    loop {
        let question: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")?;
        let question = question.trim();

        if question.is_empty() || EXIT_WORDS.contains(&question) {
            break;
        }

        let history = session
            .conversation()
            .recent(session_config.history_in_prompt);

        let bar = spinner("Thinking...");
        let response = chain.invoke_with_history(question, &history).await;
        bar.finish_and_clear();

        match response {
            Ok(response) => {
                println!("{} {}", style("Assistant:").bold().green(), response.answer);
                println!();
                session
                    .record(ChatTurn::new(question, response.answer))
                    .await
                    .context("Failed to record chat turn")?;
            }
            Err(e) => {
                warn!("Chain failed in state {:?}: {}", chain.state(), e);
                eprintln!("{} {}", style("Error:").red(), e);
                if e.is_transient() {
                    eprintln!("The service may be busy; ask again in a moment.");
                }
            }
        }
    }

    info!(
        "Chat session {} ended with {} turns in memory",
        session.conversation().id(),
        session.conversation().len()
    );
    Ok(())
}

/// List stored chat sessions, or the turns of one session
pub async fn show_history(config: Config, session: Option<String>, limit: usize) -> Result<()> {
    let database = Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .context("Failed to open the metadata database")?;

    let Some(session_id) = session else {
        let sessions = database.list_sessions(limit).await?;
        if sessions.is_empty() {
            println!("No chat sessions have been stored yet.");
            println!("Use 'pdf-rag chat' to start one.");
            return Ok(());
        }

        println!("Chat Sessions ({} shown):", sessions.len());
        println!();
        for summary in sessions {
            println!(
                "{} {}",
                style(&summary.id).cyan(),
                summary.title.as_deref().unwrap_or("(untitled)")
            );
            println!(
                "   Turns: {}  Last active: {}",
                summary.turn_count,
                summary.updated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        return Ok(());
    };

    let record = database
        .get_session(&session_id)
        .await?
        .with_context(|| format!("Unknown chat session: {}", session_id))?;

    println!(
        "Session {} started {}",
        style(&record.id).cyan(),
        record.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!();

    let turns = database.list_turns(&session_id, limit).await?;
    if turns.is_empty() {
        println!("No turns recorded.");
    }
    for turn in turns {
        println!(
            "{} {}",
            style(format!("[{}]", turn.asked_at.format("%H:%M:%S"))).dim(),
            style(format!("You: {}", turn.question)).bold()
        );
        println!("Assistant: {}", turn.answer);
        println!();
    }

    Ok(())
}

/// Show the configured index and the ingestion ledger
pub async fn show_status(config: Config, secrets: &Secrets) -> Result<()> {
    let pipeline = open_pipeline(config, secrets).await?;
    let status = pipeline
        .status()
        .await
        .context("Failed to query the vector index")?;

    println!("{}", style("📊 pdf-rag Status").bold().cyan());
    println!("{}", "=".repeat(40));
    println!("Document: {}", status.document.display());
    println!(
        "Index: {} ({} backend, namespace {})",
        style(&status.index).cyan(),
        status.backend,
        status.namespace
    );
    println!("Dimension: {}", status.dimension);
    println!("Records: {}", status.records);

    match &status.last_ingestion {
        Some(ingestion) => {
            println!(
                "Last ingestion: #{} {} ({} chunks, started {})",
                ingestion.id,
                ingestion.status,
                ingestion.chunk_count,
                ingestion.started_at.format("%Y-%m-%d %H:%M:%S")
            );
            if let Some(error) = &ingestion.error_message {
                println!("   {} {}", style("Error:").red(), error);
            }
        }
        None => {
            println!("Last ingestion: none");
            println!("Use 'pdf-rag ingest' to index the document.");
        }
    }

    let recent = pipeline.database().list_ingestions(5).await?;
    if recent.len() > 1 {
        println!();
        println!("{}", style("Recent ingestions:").bold());
        for ingestion in recent {
            println!(
                "  #{} {} {} ({})",
                ingestion.id,
                ingestion.status,
                ingestion.document_path,
                short_fingerprint(&ingestion.fingerprint)
            );
        }
    }

    Ok(())
}

fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

/// First `limit` characters of `text` on one line
fn preview(text: &str, limit: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= limit {
        return flat;
    }
    let mut cut: String = flat.chars().take(limit).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("a\n b\t c", 10), "a b c");
        assert_eq!(preview("abcdef", 3), "abc…");
        assert_eq!(preview("日本語テキスト", 3), "日本語…");
    }

    #[test]
    fn document_override_applies() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let config = load_config(Some(temp_dir.path()), Some(PathBuf::from("other.pdf")))
            .expect("defaults load");

        assert_eq!(config.document.path, PathBuf::from("other.pdf"));
        assert_eq!(config.get_base_dir(), temp_dir.path());
    }

    #[tokio::test]
    async fn search_rejects_out_of_range_k() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let config = load_config(Some(temp_dir.path()), None).expect("defaults load");
        let secrets = Secrets {
            cohere_api_key: None,
            pinecone_api_key: None,
            groq_api_key: None,
        };

        for k in [0, 101] {
            let error = search_document(config.clone(), &secrets, "ReAct", Some(k))
                .await
                .expect_err("k is rejected");
            assert!(format!("{:#}", error).contains("Invalid top-k"));
        }
    }

    #[tokio::test]
    async fn history_without_sessions_succeeds() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let config = load_config(Some(temp_dir.path()), None).expect("defaults load");

        show_history(config.clone(), None, 10)
            .await
            .expect("empty history lists");
        assert!(show_history(config, Some("missing".to_string()), 10)
            .await
            .is_err());
    }
}
