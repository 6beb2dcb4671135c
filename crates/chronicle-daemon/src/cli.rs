//! CLI argument parsing for `chronicle`.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};

/// Chronicle
///
/// Retrieval-augmented summaries of named historical events.
#[derive(Parser, Debug)]
#[command(name = "chronicle")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/chronicle/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override the vector index directory
    #[arg(long, global = true)]
    pub index_path: Option<String>,

    /// Use the feature-hashing embedder and mock summarizer (no model
    /// download, no API key)
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch, chunk and index an event's reference document
    Ingest {
        /// Event name, e.g. "Battle of Hastings"
        event: String,
    },

    /// Print the passages most relevant to an event
    Retrieve {
        event: String,

        /// Number of passages (default from config)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Retrieve passages and summarize them
    Summarize {
        event: String,

        /// Number of passages fed to the summarizer (default from config)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Show index statistics
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive session sharing one in-memory registry across commands
    Session,

    /// Print the effective configuration
    Config,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
