//! cbtsim CLI — the main entry point.
//!
//! Commands:
//! - `onboard`    — Write the default config
//! - `serve`      — Start the HTTP gateway
//! - `chat`       — Interactive terminal session
//! - `knowledge`  — Manage the retrieval knowledge base

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "cbtsim",
    about = "cbtsim — CBT therapy session simulator",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Talk to the simulated therapist in the terminal
    Chat {
        /// Resume or name a session (a new id is generated otherwise)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Manage the knowledge base used for retrieval
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },
}

#[derive(Subcommand)]
enum KnowledgeAction {
    /// Load the built-in CBT technique descriptions
    Seed,

    /// Load a counselling dataset (JSONL with Context/Response fields)
    Load {
        file: std::path::PathBuf,

        /// Maximum rows to read
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Search the knowledge base
    Search {
        query: String,

        /// Number of results
        #[arg(short, default_value_t = 4)]
        k: usize,
    },

    /// Show knowledge base statistics
    Stats,

    /// Delete every stored entry
    Clear {
        #[arg(long)]
        confirm: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init(),
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat { session } => commands::chat::run(session).await?,
        Commands::Knowledge { action } => match action {
            KnowledgeAction::Seed => commands::knowledge::seed().await?,
            KnowledgeAction::Load { file, limit } => commands::knowledge::load(&file, limit).await?,
            KnowledgeAction::Search { query, k } => commands::knowledge::search(&query, k).await?,
            KnowledgeAction::Stats => commands::knowledge::stats().await?,
            KnowledgeAction::Clear { confirm } => commands::knowledge::clear(confirm).await?,
        },
    }

    Ok(())
}
