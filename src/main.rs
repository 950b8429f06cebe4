use clap::{Parser, Subcommand};
use pdf_rag::Result;
use pdf_rag::commands::{
    ask_question, chat, ingest_document, load_config, search_document, show_history, show_status,
};
use pdf_rag::config::{Secrets, resolve_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdf-rag")]
#[command(about = "Ask questions about a PDF using retrieval-augmented generation")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and local state
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    /// Document to index and query instead of the configured one
    #[arg(long, global = true)]
    document: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure services, chunking and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load, chunk and embed the document into the vector index
    Ingest {
        /// Clear the namespace and re-ingest even if the document is unchanged
        #[arg(long)]
        force: bool,
    },
    /// Ask a single question about the document
    Ask {
        question: String,
        /// Print the answer and its context as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the chunks most similar to a query
    Search {
        query: String,
        /// Number of chunks to return
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Start an interactive chat about the document
    Chat {
        /// Continue a stored session
        #[arg(long)]
        resume: Option<String>,
    },
    /// List stored chat sessions or the turns of one session
    History {
        #[arg(long)]
        session: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show the index and ingestion status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Config { show } = cli.command {
        let config_dir = resolve_config_dir(cli.config_dir.as_deref())?;
        if show {
            show_config(&config_dir)?;
        } else {
            run_interactive_config(&config_dir)?;
        }
        return Ok(());
    }

    let config = load_config(cli.config_dir.as_deref(), cli.document)?;
    let secrets = Secrets::from_env();

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Ingest { force } => {
            ingest_document(config, &secrets, force).await?;
        }
        Commands::Ask { question, json } => {
            ask_question(config, &secrets, &question, json).await?;
        }
        Commands::Search { query, k } => {
            search_document(config, &secrets, &query, k).await?;
        }
        Commands::Chat { resume } => {
            chat(config, &secrets, resume).await?;
        }
        Commands::History { session, limit } => {
            show_history(config, session, limit).await?;
        }
        Commands::Status => {
            show_status(config, &secrets).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["pdf-rag", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Status));
        }
    }

    #[test]
    fn ask_command_with_json() {
        let cli = Cli::try_parse_from(["pdf-rag", "ask", "What is ReAct?", "--json"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask { question, json } = parsed.command {
                assert_eq!(question, "What is ReAct?");
                assert!(json);
            } else {
                panic!("expected ask command");
            }
        }
    }

    #[test]
    fn ingest_force_flag() {
        let cli = Cli::try_parse_from(["pdf-rag", "ingest", "--force"]).expect("parses");
        assert!(matches!(cli.command, Commands::Ingest { force: true }));

        let cli = Cli::try_parse_from(["pdf-rag", "ingest"]).expect("parses");
        assert!(matches!(cli.command, Commands::Ingest { force: false }));
    }

    #[test]
    fn search_with_k() {
        let cli = Cli::try_parse_from(["pdf-rag", "search", "HotpotQA", "-k", "7"]).expect("parses");

        if let Commands::Search { query, k } = cli.command {
            assert_eq!(query, "HotpotQA");
            assert_eq!(k, Some(7));
        } else {
            panic!("expected search command");
        }
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "pdf-rag",
            "chat",
            "--resume",
            "abc",
            "--document",
            "paper.pdf",
            "--config-dir",
            "/tmp/pdf-rag",
        ])
        .expect("parses");

        assert_eq!(cli.document, Some(PathBuf::from("paper.pdf")));
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/pdf-rag")));
        assert!(matches!(cli.command, Commands::Chat { resume: Some(ref id) } if id == "abc"));
    }

    #[test]
    fn history_defaults() {
        let cli = Cli::try_parse_from(["pdf-rag", "history"]).expect("parses");

        if let Commands::History { session, limit } = cli.command {
            assert_eq!(session, None);
            assert_eq!(limit, 20);
        } else {
            panic!("expected history command");
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["pdf-rag", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Config { show: true }));
        }
    }

    #[test]
    fn ask_requires_question() {
        let cli = Cli::try_parse_from(["pdf-rag", "ask"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["pdf-rag", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["pdf-rag", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
