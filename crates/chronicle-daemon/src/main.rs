//! Chronicle
//!
//! Retrieval-augmented summaries of named historical events.
//!
//! # Usage
//!
//! ```bash
//! chronicle ingest "Battle of Hastings"
//! chronicle retrieve "Battle of Hastings" -k 5
//! chronicle summarize "French Revolution"
//! chronicle status
//! chronicle session
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/chronicle/config.toml)
//! 3. `--config` file
//! 4. Environment variables (CHRONICLE_*)
//! 5. CLI flags

use std::io::Write;

use anyhow::Result;
use tokio::io::BufReader;

use chronicle_daemon::{
    build_chronicle, handle_config, handle_ingest, handle_retrieve, handle_status,
    handle_summarize, init_logging, load_settings, run_session, Cli, Commands, Overrides,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let overrides = Overrides::from(&cli);

    let settings = load_settings(&overrides)?;
    init_logging(&settings.log_level)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if let Commands::Config = cli.command {
        return handle_config(&settings, &mut out);
    }

    let app = build_chronicle(&settings, overrides.offline).await?;

    match cli.command {
        Commands::Ingest { event } => handle_ingest(&app, &event, &mut out).await?,
        Commands::Retrieve { event, top_k } => {
            handle_retrieve(&app, &event, top_k, &mut out).await?
        }
        Commands::Summarize { event, top_k } => {
            handle_summarize(&app, &event, top_k, &mut out).await?
        }
        Commands::Status { json } => handle_status(&app, json, &mut out)?,
        Commands::Session => {
            let stdin = BufReader::new(tokio::io::stdin());
            run_session(&app, stdin, &mut out).await?
        }
        Commands::Config => {}
    }

    out.flush()?;
    Ok(())
}
