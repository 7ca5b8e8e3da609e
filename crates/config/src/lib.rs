//! Configuration loading, validation, and management for cbtsim.
//!
//! Loads configuration from `~/.cbtsim/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.cbtsim/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default generation provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Temperature for therapeutic generation
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per completion (unset lets the model decide)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Session windowing and summarisation
    #[serde(default)]
    pub session: SessionConfig,

    /// Knowledge retrieval
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4.1-nano".into()
}
fn default_temperature() -> f32 {
    0.3
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("session", &self.session)
            .field("retrieval", &self.retrieval)
            .field("gateway", &self.gateway)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Regenerate the summary whenever `message_count % summary_interval == 0`
    #[serde(default = "default_summary_interval")]
    pub summary_interval: usize,

    /// Sessions with at most this many messages send their full history
    #[serde(default = "default_full_history_limit")]
    pub full_history_limit: usize,

    /// Messages kept verbatim after the summary
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,

    #[serde(default = "default_summary_max_words")]
    pub summary_max_words: usize,
}

fn default_summary_interval() -> usize {
    6
}
fn default_full_history_limit() -> usize {
    6
}
fn default_recent_window() -> usize {
    4
}
fn default_summary_temperature() -> f32 {
    0.1
}
fn default_summary_max_words() -> usize {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            summary_interval: default_summary_interval(),
            full_history_limit: default_full_history_limit(),
            recent_window: default_recent_window(),
            summary_temperature: default_summary_temperature(),
            summary_max_words: default_summary_max_words(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// "file", "memory", or "none"
    #[serde(default = "default_retrieval_backend")]
    pub backend: String,

    /// JSONL path for the file backend (default: `~/.cbtsim/knowledge/knowledge.jsonl`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub min_score: f32,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embed queries (and ingested chunks) through the provider
    #[serde(default)]
    pub use_embeddings: bool,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_true() -> bool {
    true
}
fn default_retrieval_backend() -> String {
    "file".into()
}
fn default_top_k() -> usize {
    4
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}
fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: default_retrieval_backend(),
            path: None,
            top_k: default_top_k(),
            min_score: 0.0,
            embedding_model: default_embedding_model(),
            use_embeddings: false,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl RetrievalConfig {
    /// Resolved knowledge file path (expands a leading `~/`).
    pub fn knowledge_path(&self) -> PathBuf {
        match &self.path {
            Some(p) => match p.strip_prefix("~/") {
                Some(rest) => dirs_home().join(rest),
                None => PathBuf::from(p),
            },
            None => AppConfig::config_dir().join("knowledge").join("knowledge.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Requests per minute per client (health checks exempt)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: usize,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_rate_limit() -> usize {
    60
}
fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            rate_limit_per_minute: default_rate_limit(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.cbtsim/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `CBTSIM_API_KEY` (highest priority)
    /// - `OPENAI_API_KEY`
    /// - `OPENROUTER_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("CBTSIM_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("CBTSIM_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("CBTSIM_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".cbtsim")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, t) in [
            ("default_temperature", self.default_temperature),
            ("session.summary_temperature", self.session.summary_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 2.0"
                )));
            }
        }

        if self.session.summary_interval == 0 {
            return Err(ConfigError::ValidationError(
                "session.summary_interval must be >= 1".into(),
            ));
        }

        if self.session.recent_window == 0 {
            return Err(ConfigError::ValidationError(
                "session.recent_window must be >= 1".into(),
            ));
        }

        if !matches!(self.retrieval.backend.as_str(), "file" | "memory" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.backend must be one of file, memory, none (got '{}')",
                self.retrieval.backend
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError("retrieval.top_k must be >= 1".into()));
        }

        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_overlap must be smaller than retrieval.chunk_size".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            max_tokens: None,
            session: SessionConfig::default(),
            retrieval: RetrievalConfig::default(),
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.default_model, "gpt-4.1-nano");
        assert_eq!(config.session.summary_interval, 6);
        assert_eq!(config.session.recent_window, 4);
        assert_eq!(config.gateway.port, 8000);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.retrieval.top_k, config.retrieval.top_k);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_summary_interval_rejected() {
        let mut config = AppConfig::default();
        config.session.summary_interval = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("summary_interval"));
    }

    #[test]
    fn overlap_must_be_below_chunk_size() {
        let mut config = AppConfig::default();
        config.retrieval.chunk_overlap = config.retrieval.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_retrieval_backend_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.backend = "pinecone".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retrieval.backend"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "openai");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_model = "gpt-4o-mini"

[session]
summary_interval = 8

[retrieval]
backend = "memory"
top_k = 2
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.session.summary_interval, 8);
        assert_eq!(config.session.recent_window, 4);
        assert_eq!(config.retrieval.backend, "memory");
        assert_eq!(config.retrieval.top_k, 2);
        assert_eq!(config.gateway.port, 8000);
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_temperature = \"hot\"").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_output_redacts_keys() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn explicit_knowledge_path_is_used() {
        let retrieval = RetrievalConfig {
            path: Some("/data/kb.jsonl".into()),
            ..RetrievalConfig::default()
        };
        assert_eq!(retrieval.knowledge_path(), PathBuf::from("/data/kb.jsonl"));
        assert!(RetrievalConfig::default()
            .knowledge_path()
            .ends_with("knowledge/knowledge.jsonl"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4.1-nano"));
        assert!(toml_str.contains("summary_interval"));
    }
}
