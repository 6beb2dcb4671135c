//! Chronicle command-line front end.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `app`: Request layer with per-request deadlines
//! - `commands`: Configuration, wiring and command implementations

pub mod app;
pub mod cli;
pub mod commands;

pub use app::Chronicle;
pub use cli::{Cli, Commands};
pub use commands::{
    assemble_chronicle, build_chronicle, handle_config, handle_ingest, handle_retrieve, handle_status,
    handle_summarize, init_logging, load_settings, run_session, Overrides, SessionCommand,
};
