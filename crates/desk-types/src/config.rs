//! Configuration loading for Research Desk.
//!
//! Layered precedence: built-in defaults -> config file -> env vars -> CLI
//! flags (applied by the caller). The default config file lives at
//! `~/.config/research-desk/config.toml`.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::DeskError;

/// Embedding/extraction provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSettings {
    /// API key. Conventionally supplied via env (`DESK_OPENAI__API_KEY` or
    /// `OPENAI_API_KEY`), not stored in the config file.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for entity/query embeddings
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Model used for thesis extraction
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Per-request timeout for provider calls
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl OpenAiSettings {
    /// The configured key, falling back to the conventional `OPENAI_API_KEY`
    /// environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

/// Search result bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Top-K cap for semantic results
    #[serde(default = "default_semantic_limit")]
    pub semantic_limit: usize,

    /// Cap for keyword results
    #[serde(default = "default_keyword_limit")]
    pub keyword_limit: usize,
}

fn default_semantic_limit() -> usize {
    10
}

fn default_keyword_limit() -> usize {
    20
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            semantic_limit: default_semantic_limit(),
            keyword_limit: default_keyword_limit(),
        }
    }
}

/// Bulk re-embedding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillSettings {
    /// Pause between successive provider calls, cooperative pacing against
    /// upstream rate limits
    #[serde(default = "default_backfill_delay_ms")]
    pub delay_ms: u64,
}

fn default_backfill_delay_ms() -> u64 {
    250
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            delay_ms: default_backfill_delay_ms(),
        }
    }
}

/// Main application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// HTTP listen host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub openai: OpenAiSettings,

    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub backfill: BackfillSettings,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "research-desk")
        .map(|p| p.data_local_dir().join("desk.db"))
        .unwrap_or_else(|| PathBuf::from("./desk.db"))
        .to_string_lossy()
        .to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            openai: OpenAiSettings::default(),
            search: SearchSettings::default(),
            backfill: BackfillSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (`~/.config/research-desk/config.toml`)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (`DESK_*`; nested keys use `__`, e.g.
    ///    `DESK_OPENAI__API_KEY`, `DESK_SEARCH__SEMANTIC_LIMIT`)
    ///
    /// CLI flag overrides are applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, DeskError> {
        let config_dir = ProjectDirs::from("", "", "research-desk")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| DeskError::Config(e.to_string()))?
            .set_default("host", default_host())
            .map_err(|e| DeskError::Config(e.to_string()))?
            .set_default("port", default_port() as i64)
            .map_err(|e| DeskError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| DeskError::Config(e.to_string()))?
            .set_default("openai.base_url", default_base_url())
            .map_err(|e| DeskError::Config(e.to_string()))?
            .set_default("openai.embedding_model", default_embedding_model())
            .map_err(|e| DeskError::Config(e.to_string()))?
            .set_default("openai.chat_model", default_chat_model())
            .map_err(|e| DeskError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Double underscore separates nesting levels so keys like db_path
        // survive intact.
        builder = builder.add_source(
            Environment::with_prefix("DESK")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| DeskError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| DeskError::Config(e.to_string()))
    }

    /// Socket address string for the HTTP server.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Expand a leading `~` in `db_path` to the home directory.
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home).join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }

    /// Sanity-check values that would misbehave silently.
    pub fn validate(&self) -> Result<(), DeskError> {
        if self.search.semantic_limit == 0 {
            return Err(DeskError::Config(
                "search.semantic_limit must be > 0".to_string(),
            ));
        }
        if self.search.keyword_limit == 0 {
            return Err(DeskError::Config(
                "search.keyword_limit must be > 0".to_string(),
            ));
        }
        if self.openai.timeout_secs == 0 {
            return Err(DeskError::Config(
                "openai.timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
