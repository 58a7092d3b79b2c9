//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/spitch/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/spitch/` (~/.config/spitch/)
//! - Data: `$XDG_DATA_HOME/spitch/` (~/.local/share/spitch/)
//! - State/Logs: `$XDG_STATE_HOME/spitch/` (~/.local/state/spitch/)

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Assistant identity
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Model backend for the model tier (optional; without it the tier is skipped)
    #[serde(default)]
    pub model: Option<ModelConfig>,

    /// Intent resolution tuning
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Step execution tuning
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Conversation history settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Memory bank caps
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Extra shell safety rules
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_name")]
    pub name: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
        }
    }
}

fn default_assistant_name() -> String {
    "Spitch".to_string()
}

/// Model provider configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Provider type
    pub provider: ModelProvider,
    /// Model to use
    pub model: String,
    /// API endpoint (optional, uses default for provider)
    pub endpoint: Option<String>,
    /// API key (can also use env var)
    pub api_key: Option<String>,
    /// HTTP timeout for a single completion
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

fn default_model_timeout() -> u64 {
    15
}

/// Supported model providers
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    Ollama,
    Claude,
    OpenAI,
    Gemini,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::Ollama => "ollama",
            ModelProvider::Claude => "claude",
            ModelProvider::OpenAI => "openai",
            ModelProvider::Gemini => "gemini",
        }
    }

    /// Returns the default endpoint for this provider
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ModelProvider::Ollama => "http://localhost:11434",
            ModelProvider::Claude => "https://api.anthropic.com",
            ModelProvider::OpenAI => "https://api.openai.com",
            ModelProvider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    /// Environment variable consulted when no `api_key` is configured.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ModelProvider::Ollama => None,
            ModelProvider::Claude => Some("ANTHROPIC_API_KEY"),
            ModelProvider::OpenAI => Some("OPENAI_API_KEY"),
            ModelProvider::Gemini => Some("GEMINI_API_KEY"),
        }
    }
}

/// Intent resolution configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    /// Plans must score strictly above this to be executed
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Number of recent interactions embedded in the model prompt
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            context_turns: default_context_turns(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.5
}

fn default_context_turns() -> usize {
    3
}

/// Task executor configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ExecutorConfig {
    /// Attempts per step, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single backoff delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Pause after a settling action succeeds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Actions followed by the settling pause
    #[serde(default = "default_settle_actions")]
    pub settle_actions: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            settle_ms: default_settle_ms(),
            settle_actions: default_settle_actions(),
        }
    }
}

impl ExecutorConfig {
    /// Build the per-step retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
        )
        .with_max_delay(Duration::from_millis(self.max_backoff_ms))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    2000
}

fn default_settle_ms() -> u64 {
    5000
}

fn default_settle_actions() -> Vec<String> {
    vec!["open_app".to_string()]
}

/// Session context configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Interactions kept in the rolling history
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}

fn default_max_history() -> usize {
    20
}

/// Memory bank configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    /// Cap for each of the successful/failed command lists
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Cap for the feedback history
    #[serde(default = "default_max_feedback")]
    pub max_feedback: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
            max_feedback: default_max_feedback(),
        }
    }
}

fn default_max_records() -> usize {
    100
}

fn default_max_feedback() -> usize {
    50
}

/// Shell safety configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SafetyConfig {
    /// Additional regexes that refuse a shell command outright
    #[serde(default)]
    pub extra_blocked_patterns: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.resolver.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "resolver.confidence_threshold must be between 0 and 1, got {}",
                threshold
            )));
        }
        if self.executor.max_attempts == 0 {
            return Err(Error::Config(
                "executor.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.session.max_history == 0 {
            return Err(Error::Config(
                "session.max_history must be at least 1".to_string(),
            ));
        }
        if self.memory.max_records == 0 {
            return Err(Error::Config(
                "memory.max_records must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/spitch/config.toml` (~/.config/spitch/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("spitch").join("config.toml")
    }

    /// Returns the data directory path (for persisted stores)
    ///
    /// `$XDG_DATA_HOME/spitch/` (~/.local/share/spitch/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("spitch")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/spitch/` (~/.local/state/spitch/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("spitch")
    }

    /// `$XDG_DATA_HOME/spitch/session.json`
    pub fn session_path() -> PathBuf {
        Self::data_dir().join("session.json")
    }

    /// `$XDG_DATA_HOME/spitch/memory.json`
    pub fn memory_path() -> PathBuf {
        Self::data_dir().join("memory.json")
    }

    /// `$XDG_DATA_HOME/spitch/patterns.json`
    pub fn patterns_path() -> PathBuf {
        Self::data_dir().join("patterns.json")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
