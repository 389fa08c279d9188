//! # Evidence Harness CLI (`evh`)
//!
//! ## Usage
//!
//! ```bash
//! evh --config ./config/evh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `evh init` | Create the SQLite database and schema |
//! | `evh import <file>` | Load passages from a JSONL file |
//! | `evh retrieve "<query>"` | Run tiered retrieval and print the results |
//! | `evh serve` | Start the HTTP retrieval server |
//!
//! Logs go to stderr and are filtered by `RUST_LOG` (default `info`), so
//! `evh retrieve --json` output on stdout stays machine-readable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use evidence_harness::{config, import, migrate, retrieve, server};

/// Evidence Harness: tiered passage retrieval with confidence signals.
#[derive(Parser)]
#[command(name = "evh", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/evh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Import passages from a JSONL file.
    ///
    /// Each line is `{"id"?, "content", "scope_key"?, "locator"?, "embedding"?}`.
    /// Missing embeddings are computed when an embedding provider is configured.
    Import {
        /// Path to the JSONL file.
        file: PathBuf,
    },

    /// Retrieve supporting passages for a query.
    Retrieve {
        /// The query text.
        query: String,

        /// Restrict retrieval to passages with this scope key.
        #[arg(long)]
        scope: Option<String>,

        /// Number of results to return (defaults to `[retrieval].target_count`).
        #[arg(long)]
        count: Option<usize>,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP retrieval server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file } => {
            import::run_import(&cfg, &file).await?;
        }
        Commands::Retrieve {
            query,
            scope,
            count,
            json,
        } => {
            retrieve::run_retrieve(&cfg, &query, scope.as_deref(), count, json).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
