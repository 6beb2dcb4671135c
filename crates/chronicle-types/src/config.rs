//! Configuration loading for Chronicle.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/chronicle/config.toml.

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ChronicleError;

/// Providers accepted by `SummarizerSettings::provider`.
pub const SUMMARIZER_PROVIDERS: &[&str] = &["gemini", "openai", "anthropic", "mock"];

/// Reference document source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Wikipedia language edition (e.g., "en")
    #[serde(default = "default_source_language")]
    pub language: String,

    /// User-Agent sent to the MediaWiki API
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Override for the API endpoint (defaults to https://{language}.wikipedia.org/w/api.php)
    #[serde(default)]
    pub api_url: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_user_agent() -> String {
    format!(
        "chronicle/{} (https://github.com/chronicle-rag/chronicle)",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_source_timeout() -> u64 {
    30
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            language: default_source_language(),
            user_agent: default_user_agent(),
            api_url: None,
            timeout_secs: default_source_timeout(),
        }
    }
}

impl SourceSettings {
    /// Resolved MediaWiki API endpoint.
    pub fn api_endpoint(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.wikipedia.org/w/api.php", self.language))
    }
}

/// Summarizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerSettings {
    /// Provider name ("gemini", "openai", "anthropic", "mock")
    #[serde(default = "default_summarizer_provider")]
    pub provider: String,

    /// Model name (e.g., "gemini-1.5-pro", "gpt-4o-mini")
    #[serde(default = "default_summarizer_model")]
    pub model: String,

    /// API key (prefer the provider's env var over storing it in a file)
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    #[serde(default)]
    pub api_base_url: Option<String>,
}

fn default_summarizer_provider() -> String {
    "gemini".to_string()
}

fn default_summarizer_model() -> String {
    "gemini-1.5-pro".to_string()
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            provider: default_summarizer_provider(),
            model: default_summarizer_model(),
            api_key: None,
            api_base_url: None,
        }
    }
}

impl SummarizerSettings {
    /// Environment variable consulted when no key is configured.
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self.provider.as_str() {
            "gemini" => Some("GEMINI_API_KEY"),
            "openai" => Some("OPENAI_API_KEY"),
            "anthropic" => Some("ANTHROPIC_API_KEY"),
            _ => None,
        }
    }

    /// Configured key, falling back to the provider's conventional env var.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            self.api_key_env_var()
                .and_then(|var| std::env::var(var).ok())
                .filter(|key| !key.is_empty())
        })
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the persisted vector index
    #[serde(default = "default_vector_index_path")]
    pub vector_index_path: String,

    /// Embedding dimension; must match the embedding model
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// HuggingFace repository of the sentence embedding model
    #[serde(default = "default_model_repo")]
    pub model_repo: String,

    /// Model cache directory (defaults to the platform cache dir)
    #[serde(default)]
    pub model_cache_dir: Option<String>,

    /// Passages retrieved per summary
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Upper bound on a single ingest/retrieve/summarize request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Reference document source
    #[serde(default)]
    pub source: SourceSettings,

    /// Summarizer configuration
    #[serde(default)]
    pub summarizer: SummarizerSettings,
}

fn default_vector_index_path() -> String {
    ProjectDirs::from("", "", "chronicle")
        .map(|p| p.data_local_dir().join("vector-index"))
        .unwrap_or_else(|| PathBuf::from("./vector-index"))
        .to_string_lossy()
        .to_string()
}

fn default_embedding_dimension() -> usize {
    384 // all-MiniLM-L6-v2
}

fn default_model_repo() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_top_k() -> usize {
    3
}

fn default_request_timeout() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vector_index_path: default_vector_index_path(),
            embedding_dimension: default_embedding_dimension(),
            model_repo: default_model_repo(),
            model_cache_dir: None,
            default_top_k: default_top_k(),
            request_timeout_secs: default_request_timeout(),
            log_level: default_log_level(),
            source: SourceSettings::default(),
            summarizer: SummarizerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/chronicle/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (CHRONICLE_*, nested keys joined by `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ChronicleError> {
        let config_dir = ProjectDirs::from("", "", "chronicle")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("vector_index_path", default_vector_index_path())
            .map_err(|e| ChronicleError::Config(e.to_string()))?
            .set_default("embedding_dimension", default_embedding_dimension() as i64)
            .map_err(|e| ChronicleError::Config(e.to_string()))?
            .set_default("model_repo", default_model_repo())
            .map_err(|e| ChronicleError::Config(e.to_string()))?
            .set_default("default_top_k", default_top_k() as i64)
            .map_err(|e| ChronicleError::Config(e.to_string()))?
            .set_default("request_timeout_secs", default_request_timeout() as i64)
            .map_err(|e| ChronicleError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| ChronicleError::Config(e.to_string()))?
            .set_default("summarizer.provider", default_summarizer_provider())
            .map_err(|e| ChronicleError::Config(e.to_string()))?
            .set_default("summarizer.model", default_summarizer_model())
            .map_err(|e| ChronicleError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // CHRONICLE_DEFAULT_TOP_K, CHRONICLE_SUMMARIZER__PROVIDER, ...
        builder = builder.add_source(
            Environment::with_prefix("CHRONICLE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| ChronicleError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| ChronicleError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would make the index or retrieval unusable.
    pub fn validate(&self) -> Result<(), ChronicleError> {
        if self.embedding_dimension == 0 {
            return Err(ChronicleError::Config(
                "embedding_dimension must be > 0".to_string(),
            ));
        }
        if self.default_top_k == 0 {
            return Err(ChronicleError::Config(
                "default_top_k must be > 0".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ChronicleError::Config(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }
        if !SUMMARIZER_PROVIDERS.contains(&self.summarizer.provider.as_str()) {
            return Err(ChronicleError::Config(format!(
                "unknown summarizer provider '{}' (expected one of {})",
                self.summarizer.provider,
                SUMMARIZER_PROVIDERS.join(", ")
            )));
        }
        Ok(())
    }

    /// Expand ~ in vector_index_path to the home directory
    pub fn expanded_index_path(&self) -> PathBuf {
        expand_home(&self.vector_index_path)
    }

    /// Expanded model cache directory, if one is configured
    pub fn expanded_model_cache_dir(&self) -> Option<PathBuf> {
        self.model_cache_dir.as_deref().map(expand_home)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
