use clap::{Parser, Subcommand};
use log_qa::commands::{ask, chat, delete_indexed, index_files, list_indexed, show_status};
use log_qa::config::{Config, resolve_home, run_interactive_config, show_config};
use log_qa::Result;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "log-qa")]
#[command(about = "Ask questions about local log files using retrieval-augmented generation")]
#[command(version)]
struct Cli {
    /// Data directory (defaults to $LOG_QA_HOME or the platform data directory)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and indexing settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Index log files, or every log file in a directory
    Index {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ask a single question about the indexed logs
    Ask {
        question: String,
        /// Only use chunks from this document (source id or file name)
        #[arg(long)]
        source: Option<String>,
        /// Number of chunks to retrieve
        #[arg(short = 'k', long = "top-k")]
        top_k: Option<usize>,
    },
    /// Pick log files from a directory, index them and ask questions interactively
    Chat { dir: PathBuf },
    /// List indexed documents
    List,
    /// Remove a document from the index
    Delete {
        /// Source id or file name of the document
        source: String,
    },
    /// Show Ollama and index health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let home = resolve_home(cli.home.as_deref())?;

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&home)?;
        } else {
            run_interactive_config(&home)?;
        }
        return Ok(());
    }

    let config = Config::load(&home)?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Index { paths } => {
            index_files(config, &paths).await?;
        }
        Commands::Ask {
            question,
            source,
            top_k,
        } => {
            ask(config, &question, source.as_deref(), top_k).await?;
        }
        Commands::Chat { dir } => {
            chat(config, &dir).await?;
        }
        Commands::List => {
            list_indexed(&config).await?;
        }
        Commands::Delete { source } => {
            delete_indexed(config, &source).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
    }

    Ok(())
}
