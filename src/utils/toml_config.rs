//! TOML-based configuration for Delve
//!
//! `delve.toml` configures the HTTP server, the research workflow limits and
//! which backends the workflow uses (simulated or web retrieval, with or
//! without an LLM).
//!
//! # Hot Reloading
//!
//! Configuration changes are automatically detected and applied at runtime.
//! Use `DelveConfigManager` for thread-safe access to the current configuration.
//! Runs already in flight keep the options they started with.

use crate::llm::Provider;
use crate::research::ResearchOptions;
use crate::types::AppError;
use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Root configuration structure loaded from delve.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DelveConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub research: ResearchConfig,

    /// Model used for decomposition, query expansion and synthesis.
    /// Without it the rule-based strategies are used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ============= Research Configuration =============

/// Where evidence comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    /// Deterministic offline sources.
    #[default]
    Simulated,
    /// DuckDuckGo web search.
    Web,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default)]
    pub backend: SearchBackend,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_gather_timeout_ms")]
    pub gather_timeout_ms: u64,

    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,

    #[serde(default = "default_min_tasks")]
    pub min_tasks: usize,

    /// Evidence items per task from the simulated backend
    #[serde(default = "default_results")]
    pub results_per_task: usize,

    /// Hits kept per search query from the web backend
    #[serde(default = "default_results")]
    pub results_per_query: usize,

    /// Finished runs kept in memory for `/api/runs`
    #[serde(default = "default_archive_capacity")]
    pub archive_capacity: usize,
}

fn default_max_concurrency() -> usize {
    ResearchOptions::default().max_concurrency
}

fn default_gather_timeout_ms() -> u64 {
    ResearchOptions::default().gather_timeout_ms
}

fn default_max_tasks() -> usize {
    ResearchOptions::default().max_tasks
}

fn default_min_tasks() -> usize {
    ResearchOptions::default().min_tasks
}

fn default_results() -> usize {
    3
}

fn default_archive_capacity() -> usize {
    100
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackend::default(),
            max_concurrency: default_max_concurrency(),
            gather_timeout_ms: default_gather_timeout_ms(),
            max_tasks: default_max_tasks(),
            min_tasks: default_min_tasks(),
            results_per_task: default_results(),
            results_per_query: default_results(),
            archive_capacity: default_archive_capacity(),
        }
    }
}

impl ResearchConfig {
    pub fn options(&self) -> ResearchOptions {
        ResearchOptions {
            max_concurrency: self.max_concurrency,
            gather_timeout_ms: self.gather_timeout_ms,
            max_tasks: self.max_tasks,
            min_tasks: self.min_tasks,
        }
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LlmConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        model: String,
    },
    OpenAI {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        model: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl LlmConfig {
    pub fn model(&self) -> &str {
        match self {
            LlmConfig::Ollama { model, .. } | LlmConfig::OpenAI { model, .. } => model,
        }
    }

    /// Resolve into a [`Provider`], reading the API key from the environment.
    pub fn provider(&self) -> Result<Provider, ConfigError> {
        match self {
            LlmConfig::Ollama { base_url, model } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                model: model.clone(),
            }),
            LlmConfig::OpenAI {
                api_key_env,
                api_base,
                model,
            } => {
                let api_key = std::env::var(api_key_env)
                    .map_err(|_| ConfigError::MissingEnvVar(api_key_env.clone()))?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: api_base.clone(),
                    model: model.clone(),
                })
            }
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl DelveConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse without validating.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check numeric bounds and that referenced env vars exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::ValidationError(msg)) };

        if self.server.port == 0 {
            return invalid("server.port must be non-zero".to_string());
        }
        if !LOG_LEVELS.contains(&self.server.log_level.to_lowercase().as_str()) {
            return invalid(format!(
                "server.log_level '{}' is not one of {}",
                self.server.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        let research = &self.research;
        if research.max_concurrency == 0 {
            return invalid("research.max_concurrency must be at least 1".to_string());
        }
        if research.gather_timeout_ms == 0 {
            return invalid("research.gather_timeout_ms must be at least 1".to_string());
        }
        if research.max_tasks == 0 {
            return invalid("research.max_tasks must be at least 1".to_string());
        }
        if research.min_tasks == 0 || research.min_tasks > research.max_tasks {
            return invalid(format!(
                "research.min_tasks ({}) must be between 1 and max_tasks ({})",
                research.min_tasks, research.max_tasks
            ));
        }
        if research.results_per_task == 0 || research.results_per_query == 0 {
            return invalid("research.results_per_task and results_per_query must be at least 1".to_string());
        }
        if research.archive_capacity == 0 {
            return invalid("research.archive_capacity must be at least 1".to_string());
        }

        if let Some(llm) = &self.llm {
            if llm.model().trim().is_empty() {
                return invalid("llm.model must not be empty".to_string());
            }
            if let LlmConfig::OpenAI { api_key_env, .. } = llm {
                std::env::var(api_key_env)
                    .map_err(|_| ConfigError::MissingEnvVar(api_key_env.clone()))?;
            }
        }

        Ok(())
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct DelveConfigManager {
    config: Arc<ArcSwap<DelveConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
}

impl DelveConfigManager {
    /// Load the initial config from `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = DelveConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
        })
    }

    /// A manager over an in-memory config; `reload` and watching are unavailable.
    pub fn from_config(config: DelveConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::new(),
            watcher: RwLock::new(None),
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<DelveConfig> {
        self.config.load_full()
    }

    pub fn path(&self) -> Option<&Path> {
        (!self.config_path.as_os_str().is_empty()).then_some(self.config_path.as_path())
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        let Some(path) = self.path() else {
            return Err(ConfigError::ValidationError(
                "configuration was not loaded from a file".to_string(),
            ));
        };
        info!(path = %path.display(), "Reloading configuration");

        let new_config = DelveConfig::load(path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching the config file for changes
    pub fn start_watching(&self) -> Result<(), ConfigError> {
        let Some(config_path) = self.path().map(Path::to_path_buf) else {
            return Err(ConfigError::ValidationError(
                "configuration was not loaded from a file".to_string(),
            ));
        };
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let config_arc = Arc::clone(&self.config);

        let file_name = config_path.file_name().map(|n| n.to_os_string());
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_config && (event.kind.is_modify() || event.kind.is_create()) {
                        // Debounced in the receiver
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        // Watch the parent directory so editors that replace the file are seen
        if let Some(parent) = config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let debounce = Duration::from_millis(500);
            let mut last_reload: Option<std::time::Instant> = None;

            while rx.recv().await.is_some() {
                if last_reload.is_some_and(|at| at.elapsed() < debounce) {
                    continue;
                }

                // Let the write finish
                tokio::time::sleep(Duration::from_millis(100)).await;

                match DelveConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                        last_reload = Some(std::time::Instant::now());
                    }
                    Err(e) => {
                        warn!("Failed to hot-reload config: {}. Keeping previous config.", e);
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

impl Clone for DelveConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_config() -> &'static str {
        r#"
[server]
host = "0.0.0.0"
port = 8080
log_level = "debug"
log_format = "json"

[research]
backend = "web"
max_concurrency = 2
gather_timeout_ms = 5000
max_tasks = 4
min_tasks = 2

[llm]
type = "ollama"
model = "llama3.2"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config = DelveConfig::parse(sample_config()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.research.backend, SearchBackend::Web);
        assert_eq!(config.research.results_per_query, 3);
        assert_eq!(
            config.llm,
            Some(LlmConfig::Ollama {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3.2".to_string(),
            })
        );

        let options = config.research.options();
        assert_eq!(options.max_concurrency, 2);
        assert_eq!(options.gather_timeout_ms, 5000);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = DelveConfig::parse("").unwrap();
        assert_eq!(config, DelveConfig::default());
        assert_eq!(config.research.options(), ResearchOptions::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_bounds() {
        let mut config = DelveConfig::default();
        config.research.max_concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = DelveConfig::default();
        config.research.min_tasks = 10;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_tasks"));

        let mut config = DelveConfig::default();
        config.server.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_openai_requires_api_key_env() {
        let config = DelveConfig::parse(
            r#"
[llm]
type = "openai"
api_key_env = "DELVE_TEST_SURELY_UNSET_KEY"
model = "gpt-4o-mini"
"#,
        )
        .unwrap();

        assert!(matches!(config.validate(), Err(ConfigError::MissingEnvVar(ref v)) if v == "DELVE_TEST_SURELY_UNSET_KEY"));
        let llm = config.llm.as_ref().unwrap();
        assert!(llm.provider().is_err());
    }

    #[test]
    fn test_unknown_backend_is_a_parse_error() {
        let result = DelveConfig::parse("[research]\nbackend = \"carrier-pigeon\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = DelveConfig::parse(sample_config()).unwrap();
        let reparsed = DelveConfig::parse(&config.to_toml().unwrap()).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_manager_reload_picks_up_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delve.toml");
        fs::write(&path, "[server]\nport = 4000\n").unwrap();

        let manager = DelveConfigManager::new(&path).unwrap();
        assert_eq!(manager.config().server.port, 4000);

        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[server]\nport = 4001").unwrap();
        drop(file);

        manager.reload().unwrap();
        assert_eq!(manager.config().server.port, 4001);
    }

    #[test]
    fn test_manager_keeps_config_when_reload_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delve.toml");
        fs::write(&path, "[server]\nport = 4000\n").unwrap();
        let manager = DelveConfigManager::new(&path).unwrap();

        fs::write(&path, "[research]\nmax_concurrency = 0\n").unwrap();
        assert!(manager.reload().is_err());
        assert_eq!(manager.config().server.port, 4000);
    }

    #[test]
    fn test_in_memory_manager_cannot_reload() {
        let manager = DelveConfigManager::from_config(DelveConfig::default());
        assert!(manager.path().is_none());
        assert!(manager.reload().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = DelveConfig::load("/definitely/not/here/delve.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
