use clap::{Parser, Subcommand};
use docqa::commands::{
    ask_command, config_command, delete_command, history_command, ingest_command, show_command,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Ask questions about a folder of documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding and chat provider
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the search index from a directory of documents
    Ingest {
        /// Directory containing .txt, .md and .pdf files
        directory: PathBuf,
        /// Where to write the index instead of the configured location
        #[arg(long)]
        index: Option<PathBuf>,
    },
    /// Answer a question from the indexed documents
    Ask {
        question: String,
        /// Index file to read instead of the configured location
        #[arg(long)]
        index: Option<PathBuf>,
    },
    /// List past conversations
    History,
    /// Show a past conversation in full
    Show {
        /// Conversation ID
        id: i64,
    },
    /// Delete a past conversation
    Delete {
        /// Conversation ID
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            config_command(show)?;
        }
        Commands::Ingest { directory, index } => {
            ingest_command(&directory, index).await?;
        }
        Commands::Ask { question, index } => {
            ask_command(&question, index).await?;
        }
        Commands::History => {
            history_command().await?;
        }
        Commands::Show { id } => {
            show_command(id).await?;
        }
        Commands::Delete { id } => {
            delete_command(id).await?;
        }
    }

    Ok(())
}
