//! Command implementations for `chronicle`.
//!
//! Handles:
//! - configuration loading and CLI overrides
//! - logging setup
//! - wiring the index, embedder, document source and summarizer together
//! - ingest / retrieve / summarize / status / session

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chronicle_embeddings::{CandleEmbedder, EmbeddingModel, HashingEmbedder, ModelCache};
use chronicle_retrieval::{DocumentSource, EventCorpus, WikipediaSource};
use chronicle_summarizer::{MockSummarizer, Summarizer};
use chronicle_types::Settings;
use chronicle_vector::{HnswConfig, HnswIndex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::app::Chronicle;
use crate::cli::Cli;

/// Overrides taken from global CLI flags.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config_path: Option<String>,
    pub log_level: Option<String>,
    pub index_path: Option<String>,
    pub offline: bool,
}

impl From<&Cli> for Overrides {
    fn from(cli: &Cli) -> Self {
        Self {
            config_path: cli.config.clone(),
            log_level: cli.log_level.clone(),
            index_path: cli.index_path.clone(),
            offline: cli.offline,
        }
    }
}

/// Load configuration and apply CLI overrides (highest precedence).
pub fn load_settings(overrides: &Overrides) -> Result<Settings> {
    let config_path = overrides
        .config_path
        .as_deref()
        .map(|p| shellexpand::tilde(p).into_owned());

    let mut settings =
        Settings::load(config_path.as_deref()).context("Failed to load configuration")?;

    if let Some(index_path) = &overrides.index_path {
        settings.vector_index_path = shellexpand::tilde(index_path).into_owned();
    }
    if let Some(log_level) = &overrides.log_level {
        settings.log_level = log_level.clone();
    }
    if overrides.offline {
        settings.summarizer.provider = "mock".to_string();
    }

    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level. Logs go to stderr so command output stays clean.
pub fn init_logging(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Load the embedding model named by `settings`, or the hashing embedder
/// when offline.
async fn load_embedder(settings: &Settings, offline: bool) -> Result<Arc<dyn EmbeddingModel>> {
    if offline {
        info!(dim = settings.embedding_dimension, "Using feature-hashing embedder");
        return Ok(Arc::new(HashingEmbedder::new(settings.embedding_dimension)));
    }

    let cache = match settings.expanded_model_cache_dir() {
        Some(dir) => ModelCache::new(dir, settings.model_repo.clone()),
        None => ModelCache::for_repo(settings.model_repo.clone()),
    };
    info!(model = %settings.model_repo, cached = cache.is_cached(), "Loading embedding model");

    let embedder = tokio::task::spawn_blocking(move || CandleEmbedder::load(&cache))
        .await
        .context("Embedding model load task panicked")?
        .context("Failed to load embedding model")?;
    Ok(Arc::new(embedder))
}

/// Build the request layer from settings.
///
/// Refuses to start when the embedder's dimension differs from the
/// configured index dimension.
pub async fn build_chronicle(settings: &Settings, offline: bool) -> Result<Chronicle> {
    let embedder = load_embedder(settings, offline).await?;
    let source: Arc<dyn DocumentSource> =
        Arc::new(WikipediaSource::new(&settings.source).context("Failed to build document source")?);
    assemble_chronicle(settings, embedder, source, offline)
}

/// Wire an already loaded embedder and document source to the persisted
/// index and the configured summarizer.
///
/// A summarizer that cannot be configured (for example a missing API key)
/// does not stop startup: ingest, retrieve and status keep working and
/// `summarize` reports the problem.
pub fn assemble_chronicle(
    settings: &Settings,
    embedder: Arc<dyn EmbeddingModel>,
    source: Arc<dyn DocumentSource>,
    offline: bool,
) -> Result<Chronicle> {
    if embedder.dimension() != settings.embedding_dimension {
        bail!(
            "embedding model '{}' produces {}-dimensional vectors but embedding_dimension is {}; refusing to start",
            embedder.info().name,
            embedder.dimension(),
            settings.embedding_dimension
        );
    }

    let index_path = settings.expanded_index_path();
    let index = HnswIndex::open_or_create(HnswConfig::new(settings.embedding_dimension, &index_path))
        .with_context(|| format!("Failed to open vector index at {:?}", index_path))?;

    let corpus = Arc::new(
        EventCorpus::new(Box::new(index), embedder, source)
            .context("Embedding model does not match the vector index")?,
    );

    let timeout = Duration::from_secs(settings.request_timeout_secs);
    if offline {
        let summarizer: Arc<dyn Summarizer> = Arc::new(MockSummarizer::new());
        return Ok(Chronicle::new(corpus, summarizer, settings.default_top_k, timeout));
    }

    match chronicle_summarizer::from_settings(&settings.summarizer, timeout) {
        Ok(summarizer) => Ok(Chronicle::new(corpus, summarizer, settings.default_top_k, timeout)),
        Err(e) => {
            warn!(
                provider = %settings.summarizer.provider,
                error = %e,
                "Summarizer not configured; summarize is unavailable"
            );
            Ok(Chronicle::without_summarizer(
                corpus,
                e.to_string(),
                settings.default_top_k,
                timeout,
            ))
        }
    }
}

pub async fn handle_ingest(app: &Chronicle, event: &str, out: &mut impl Write) -> Result<()> {
    let info = app.ingest(event).await?;
    match info.range {
        Some(range) => writeln!(
            out,
            "Ingested '{}': {} passages at {} ({} vectors in index)",
            info.event_id, info.chunk_count, range, info.total_vectors
        )?,
        None => writeln!(
            out,
            "'{}' has an empty reference document; nothing indexed",
            info.event_id
        )?,
    }
    Ok(())
}

pub async fn handle_retrieve(
    app: &Chronicle,
    event: &str,
    top_k: Option<usize>,
    out: &mut impl Write,
) -> Result<()> {
    let passages = app.retrieve(event, top_k).await?;
    for (i, passage) in passages.iter().enumerate() {
        writeln!(out, "[{}] {}", i + 1, passage)?;
        writeln!(out)?;
    }
    Ok(())
}

pub async fn handle_summarize(
    app: &Chronicle,
    event: &str,
    top_k: Option<usize>,
    out: &mut impl Write,
) -> Result<()> {
    let summary = app.summarize(event, top_k).await?;
    writeln!(out, "{}", summary)?;
    Ok(())
}

pub fn handle_status(app: &Chronicle, json: bool, out: &mut impl Write) -> Result<()> {
    let stats = app.stats();
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
        return Ok(());
    }

    writeln!(out, "Vectors:            {}", stats.vectors)?;
    writeln!(out, "Dimension:          {}", stats.dimension)?;
    writeln!(out, "Index size:         {} bytes", stats.index_bytes)?;
    writeln!(out, "Events:             {}", stats.events)?;
    writeln!(out, "Passages:           {}", stats.passages)?;
    writeln!(out, "Reachable vectors:  {}", stats.reachable_vectors)?;
    writeln!(out, "Orphaned vectors:   {}", stats.orphaned_vectors)?;
    writeln!(out, "Superseded ranges:  {}", stats.superseded_ranges)?;
    writeln!(out, "Retired ranges:     {}", stats.retired_ranges)?;

    for record in app.events() {
        writeln!(out, "  {} {}", record.range, record.event_id)?;
    }
    Ok(())
}

/// Print the effective configuration as TOML, with the API key masked.
pub fn handle_config(settings: &Settings, out: &mut impl Write) -> Result<()> {
    let mut shown = settings.clone();
    if shown.summarizer.api_key.is_some() {
        shown.summarizer.api_key = Some("********".to_string());
    }
    let text = toml::to_string_pretty(&shown).context("Failed to render configuration")?;
    write!(out, "{}", text)?;
    Ok(())
}

/// One line of session input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Ingest(String),
    Retrieve { event: String, top_k: Option<usize> },
    Summarize { event: String, top_k: Option<usize> },
    Retire(String),
    Status,
    Help,
    Quit,
}

impl SessionCommand {
    /// Parse `verb [-k N] [event name...]`. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let (top_k, event) = parse_top_k(rest)?;
        let verb = verb.to_ascii_lowercase();
        if top_k.is_some() && !matches!(verb.as_str(), "retrieve" | "summarize") {
            return Err(format!("'{}' does not take -k", verb));
        }
        let require_event = |verb: &str| {
            if event.is_empty() {
                Err(format!("usage: {} <event>", verb))
            } else {
                Ok(event.to_string())
            }
        };

        let command = match verb.as_str() {
            "ingest" => SessionCommand::Ingest(require_event("ingest")?),
            "retrieve" => SessionCommand::Retrieve {
                event: require_event("retrieve [-k N]")?,
                top_k,
            },
            "summarize" => SessionCommand::Summarize {
                event: require_event("summarize [-k N]")?,
                top_k,
            },
            "retire" => SessionCommand::Retire(require_event("retire")?),
            "status" => SessionCommand::Status,
            "help" | "?" => SessionCommand::Help,
            "quit" | "exit" => SessionCommand::Quit,
            other => return Err(format!("unknown command '{}'; try 'help'", other)),
        };
        Ok(Some(command))
    }
}

fn parse_top_k(rest: &str) -> Result<(Option<usize>, &str), String> {
    let (flag, after_flag) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if flag != "-k" {
        return Ok((None, rest));
    }
    let after_flag = after_flag.trim_start();
    if after_flag.is_empty() {
        return Err("-k needs a number".to_string());
    }
    let (number, event) = after_flag
        .split_once(char::is_whitespace)
        .unwrap_or((after_flag, ""));
    let top_k = number
        .parse()
        .map_err(|_| format!("invalid top-k '{}'", number))?;
    Ok((Some(top_k), event.trim()))
}

const SESSION_HELP: &str = "\
Commands:
  ingest <event>             index an event's reference document
  retrieve [-k N] <event>    show the most relevant passages
  summarize [-k N] <event>   summarize the retrieved passages
  retire <event>             hide an event from retrieval
  status                     index statistics
  quit                       leave the session";

/// Interactive loop over `input`. Request errors are printed and the
/// session continues; only I/O failures end it early.
pub async fn run_session<R>(app: &Chronicle, input: R, out: &mut impl Write) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    writeln!(out, "chronicle session; type 'help' for commands")?;

    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match SessionCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                writeln!(out, "{}", message)?;
                continue;
            }
        };

        let result = match command {
            SessionCommand::Ingest(event) => handle_ingest(app, &event, out).await,
            SessionCommand::Retrieve { event, top_k } => {
                handle_retrieve(app, &event, top_k, out).await
            }
            SessionCommand::Summarize { event, top_k } => {
                handle_summarize(app, &event, top_k, out).await
            }
            SessionCommand::Retire(event) => app
                .retire(&event)
                .and_then(|_| writeln!(out, "Retired '{}'", event).map_err(Into::into)),
            SessionCommand::Status => handle_status(app, false, out),
            SessionCommand::Help => writeln!(out, "{}", SESSION_HELP).map_err(Into::into),
            SessionCommand::Quit => break,
        };

        if let Err(e) = result {
            warn!(error = %e, "Session command failed");
            writeln!(out, "error: {:#}", e)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_commands() {
        assert_eq!(
            SessionCommand::parse("ingest Battle of Hastings").unwrap(),
            Some(SessionCommand::Ingest("Battle of Hastings".to_string()))
        );
        assert_eq!(
            SessionCommand::parse("  retrieve -k 5 French Revolution ").unwrap(),
            Some(SessionCommand::Retrieve {
                event: "French Revolution".to_string(),
                top_k: Some(5),
            })
        );
        assert_eq!(
            SessionCommand::parse("RETRIEVE Battle of Hastings").unwrap(),
            Some(SessionCommand::Retrieve {
                event: "Battle of Hastings".to_string(),
                top_k: None,
            })
        );
        assert_eq!(SessionCommand::parse("status").unwrap(), Some(SessionCommand::Status));
        assert_eq!(SessionCommand::parse("exit").unwrap(), Some(SessionCommand::Quit));
        assert_eq!(SessionCommand::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_session_errors() {
        assert!(SessionCommand::parse("ingest").is_err());
        assert!(SessionCommand::parse("retrieve -k many Hastings").is_err());
        assert!(SessionCommand::parse("teleport Rome").is_err());
        assert!(SessionCommand::parse("retrieve -k").is_err());
        assert!(SessionCommand::parse("retrieve -k 4").is_err());
        assert!(SessionCommand::parse("ingest -k 4 Battle of Hastings").is_err());
    }

    #[test]
    fn test_parse_summarize_keeps_top_k() {
        assert_eq!(
            SessionCommand::parse("summarize -k 5 French Revolution").unwrap(),
            Some(SessionCommand::Summarize {
                event: "French Revolution".to_string(),
                top_k: Some(5),
            })
        );
        assert_eq!(
            SessionCommand::parse("summarize Battle of Hastings").unwrap(),
            Some(SessionCommand::Summarize {
                event: "Battle of Hastings".to_string(),
                top_k: None,
            })
        );
    }

    #[test]
    fn test_overrides_from_cli() {
        use clap::Parser;
        let cli = Cli::parse_from(["chronicle", "--offline", "--index-path", "/tmp/x", "status"]);
        let overrides = Overrides::from(&cli);
        assert!(overrides.offline);
        assert_eq!(overrides.index_path.as_deref(), Some("/tmp/x"));
    }

    #[test]
    fn test_load_settings_applies_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("chronicle.toml");
        std::fs::write(&config_path, "default_top_k = 4\nlog_level = \"warn\"\n").unwrap();

        let overrides = Overrides {
            config_path: Some(config_path.to_string_lossy().into_owned()),
            log_level: Some("debug".to_string()),
            index_path: Some("/tmp/chronicle-index".to_string()),
            offline: true,
        };
        let settings = load_settings(&overrides).unwrap();
        assert_eq!(settings.default_top_k, 4);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.vector_index_path, "/tmp/chronicle-index");
        assert_eq!(settings.summarizer.provider, "mock");
    }

    #[test]
    fn test_config_masks_api_key() {
        let mut settings = Settings::default();
        settings.summarizer.api_key = Some("secret-key".to_string());
        let mut out = Vec::new();
        handle_config(&settings, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("secret-key"));
        assert!(text.contains("default_top_k = 3"));
    }
}
