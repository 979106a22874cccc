//! TOML Configuration File Support
//!
//! Centralized configuration loading for the relay, supporting a TOML file
//! at `~/.config/agent-relay/relay.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8000"
//!
//! [agent]
//! base_url = "https://integrate.api.nvidia.com/v1"
//! model = "nvidia/llama-3.1-nemotron-ultra-253b-v1"
//! api_key_env = "NVIDIA_API_KEY"
//! timeout_secs = 120
//!
//! [stream]
//! poll_interval_ms = 100
//! chunk_delay_ms = 300
//! sentence_delimiter = "。"
//! task_timeout_secs = 300
//!
//! [classifier]
//! heuristic_fallback = true
//!
//! [storage]
//! uploads_dir = "uploads"
//! outputs_dir = "outputs"
//!
//! [limits]
//! max_message_size = 102400
//! max_messages_per_minute = 30
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::sync::Arc;

use crate::agent::{Agent, AgentConfig};
use crate::classifier::{ClassifierConfig, TextClassifier};
use crate::security::RelayLimits;
use crate::storage::StorageConfig;
use crate::streaming::{StreamConfig, StreamOrchestrator};
use crate::tasks::{TaskRunner, DEFAULT_ANNOUNCE, DEFAULT_TASK_TIMEOUT};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Server section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Listen address, e.g. `127.0.0.1:8000`
    pub bind: Option<String>,
}

/// Agent section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentToml {
    /// OpenAI-compatible base URL
    pub base_url: Option<String>,
    /// Model name
    pub model: Option<String>,
    /// API key (prefer `api_key_env`)
    pub api_key: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    /// System prompt replacing the built-in one
    pub system_prompt: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Completion token limit
    pub max_tokens: Option<u32>,
    /// HTTP timeout per call in seconds
    pub timeout_secs: Option<u64>,
}

/// Stream section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamToml {
    /// Progress poll interval in milliseconds
    pub poll_interval_ms: Option<u64>,
    /// Delay before each answer chunk in milliseconds
    pub chunk_delay_ms: Option<u64>,
    /// Single character the answer is split on
    pub sentence_delimiter: Option<String>,
    /// Message carried by the start event
    pub start_message: Option<String>,
    /// Progress message emitted when the agent task starts (empty disables)
    pub announce: Option<String>,
    /// Agent task timeout in seconds (0 disables)
    pub task_timeout_secs: Option<u64>,
}

/// Classifier section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierToml {
    /// Use the keyword heuristic when no reasoning markers are present
    pub heuristic_fallback: Option<bool>,
    /// Words marking reasoning lines
    pub reasoning_keywords: Option<Vec<String>>,
    /// Words marking answer lines
    pub result_keywords: Option<Vec<String>>,
}

/// Storage section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageToml {
    /// Upload directory
    pub uploads_dir: Option<PathBuf>,
    /// Output directory
    pub outputs_dir: Option<PathBuf>,
    /// Upload extension allowlist
    pub allowed_extensions: Option<Vec<String>>,
}

/// Limits section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsToml {
    /// Maximum message size in bytes
    pub max_message_size: Option<usize>,
    /// Maximum requests per minute
    pub max_messages_per_minute: Option<u32>,
    /// Maximum upload size in bytes
    pub max_upload_bytes: Option<u64>,
    /// Maximum file name length
    pub max_filename_length: Option<usize>,
    /// Maximum selected files per message
    pub max_selected_files: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayToml {
    /// Server section
    pub server: ServerToml,
    /// Agent section
    pub agent: AgentToml,
    /// Stream section
    pub stream: StreamToml,
    /// Classifier section
    pub classifier: ClassifierToml,
    /// Storage section
    pub storage: StorageToml,
    /// Limits section
    pub limits: LimitsToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Effective configuration of a relay process
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Agent connection settings
    pub agent: AgentConfig,
    /// Environment variable the API key was read from
    pub api_key_env: Option<String>,
    /// Pipeline timing settings
    pub stream: StreamConfig,
    /// Announcement emitted when the agent starts (empty disables)
    pub announce: String,
    /// Agent task timeout
    pub task_timeout: Option<Duration>,
    /// Classifier settings
    pub classifier: ClassifierConfig,
    /// File store settings
    pub storage: StorageConfig,
    /// Input limits
    pub limits: RelayLimits,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    /// Source of configuration values
    source: ConfigSource,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            agent: AgentConfig::default(),
            api_key_env: None,
            stream: StreamConfig::default(),
            announce: DEFAULT_ANNOUNCE.to_string(),
            task_timeout: Some(DEFAULT_TASK_TIMEOUT),
            classifier: ClassifierConfig::default(),
            storage: StorageConfig::default(),
            limits: RelayLimits::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl RelayConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Build the streaming pipeline for `agent` from this configuration
    #[must_use]
    pub fn build_orchestrator(&self, agent: Arc<dyn Agent>) -> StreamOrchestrator {
        let runner = TaskRunner::new(agent)
            .with_timeout(self.task_timeout)
            .with_announce(self.announce.as_str());
        StreamOrchestrator::new(
            runner,
            TextClassifier::new(self.classifier.clone()),
            self.stream.clone(),
        )
    }

    /// Check values that would make the relay misbehave
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.poll_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "stream.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.agent.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "agent.model must not be empty".to_string(),
            ));
        }
        if self.agent.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "agent.base_url must not be empty".to_string(),
            ));
        }
        if self.limits.max_message_size == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_message_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/agent-relay/relay.toml` or
/// `~/.config/agent-relay/relay.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("agent-relay").join("relay.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<RelayConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the resulting configuration is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<RelayConfig, ConfigError> {
    load_with_env(path, &|key: &str| std::env::var(key).ok())
}

/// Load configuration with a custom environment lookup
///
/// # Errors
///
/// See [`load_config_from_path`].
pub fn load_with_env(
    path: Option<PathBuf>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<RelayConfig, ConfigError> {
    let mut config = RelayConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: RelayToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env)?;
    resolve_api_key(&mut config, env);
    config.validate()?;

    Ok(config)
}

fn parse_bind(value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::ValidationError(format!("invalid bind address '{value}': {e}")))
}

fn parse_delimiter(value: &str) -> Result<char, ConfigError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ConfigError::ValidationError(format!(
            "sentence_delimiter must be exactly one character, got '{value}'"
        ))),
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut RelayConfig, toml: &RelayToml) -> Result<(), ConfigError> {
    // Server settings
    if let Some(bind) = &toml.server.bind {
        config.bind = parse_bind(bind)?;
    }

    // Agent settings
    if let Some(url) = &toml.agent.base_url {
        config.agent.base_url.clone_from(url);
    }
    if let Some(model) = &toml.agent.model {
        config.agent.model.clone_from(model);
    }
    if toml.agent.api_key.is_some() {
        config.agent.api_key.clone_from(&toml.agent.api_key);
    }
    if toml.agent.api_key_env.is_some() {
        config.api_key_env.clone_from(&toml.agent.api_key_env);
    }
    if toml.agent.system_prompt.is_some() {
        config.agent.system_prompt.clone_from(&toml.agent.system_prompt);
    }
    if let Some(temperature) = toml.agent.temperature {
        config.agent.temperature = temperature;
    }
    if let Some(max_tokens) = toml.agent.max_tokens {
        config.agent.max_tokens = max_tokens;
    }
    if let Some(secs) = toml.agent.timeout_secs {
        config.agent.request_timeout = Duration::from_secs(secs);
    }

    // Stream settings
    if let Some(ms) = toml.stream.poll_interval_ms {
        config.stream.poll_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.stream.chunk_delay_ms {
        config.stream.chunk_delay = Duration::from_millis(ms);
    }
    if let Some(delimiter) = &toml.stream.sentence_delimiter {
        config.stream.sentence_delimiter = parse_delimiter(delimiter)?;
    }
    if let Some(message) = &toml.stream.start_message {
        config.stream.start_message.clone_from(message);
    }
    if let Some(announce) = &toml.stream.announce {
        config.announce.clone_from(announce);
    }
    if let Some(secs) = toml.stream.task_timeout_secs {
        config.task_timeout = timeout_from_secs(secs);
    }

    // Classifier settings
    if let Some(enabled) = toml.classifier.heuristic_fallback {
        config.classifier.heuristic_fallback = enabled;
    }
    if let Some(keywords) = &toml.classifier.reasoning_keywords {
        config.classifier.reasoning_keywords.clone_from(keywords);
    }
    if let Some(keywords) = &toml.classifier.result_keywords {
        config.classifier.result_keywords.clone_from(keywords);
    }

    // Storage settings
    if let Some(dir) = &toml.storage.uploads_dir {
        config.storage.uploads_dir.clone_from(dir);
    }
    if let Some(dir) = &toml.storage.outputs_dir {
        config.storage.outputs_dir.clone_from(dir);
    }
    if let Some(extensions) = &toml.storage.allowed_extensions {
        config.storage.allowed_extensions.clone_from(extensions);
    }

    // Limits
    if let Some(size) = toml.limits.max_message_size {
        config.limits.max_message_size = size;
    }
    if let Some(n) = toml.limits.max_messages_per_minute {
        config.limits.max_messages_per_minute = n;
    }
    if let Some(bytes) = toml.limits.max_upload_bytes {
        config.limits.max_upload_bytes = bytes;
    }
    if let Some(len) = toml.limits.max_filename_length {
        config.limits.max_filename_length = len;
    }
    if let Some(n) = toml.limits.max_selected_files {
        config.limits.max_selected_files = n;
    }

    Ok(())
}

/// Apply environment variable overrides to the config
fn apply_env_config(
    config: &mut RelayConfig,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let before = config.limits.clone();

    if let Some(bind) = env("RELAY_BIND") {
        config.bind = parse_bind(&bind)?;
        config.source = ConfigSource::Env;
    }
    if let Some(url) = env("RELAY_AGENT_BASE_URL") {
        config.agent.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(model) = env("RELAY_AGENT_MODEL") {
        config.agent.model = model;
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = env("RELAY_AGENT_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        config.agent.request_timeout = Duration::from_secs(secs);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env("RELAY_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        config.stream.poll_interval = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env("RELAY_CHUNK_DELAY_MS").and_then(|v| v.parse().ok()) {
        config.stream.chunk_delay = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = env("RELAY_TASK_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        config.task_timeout = timeout_from_secs(secs);
        config.source = ConfigSource::Env;
    }
    if let Some(delimiter) = env("RELAY_SENTENCE_DELIMITER") {
        config.stream.sentence_delimiter = parse_delimiter(&delimiter)?;
        config.source = ConfigSource::Env;
    }
    if let Some(enabled) = env("RELAY_HEURISTIC_FALLBACK") {
        config.classifier.heuristic_fallback = enabled != "0" && enabled.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Some(dir) = env("RELAY_UPLOADS_DIR") {
        config.storage.uploads_dir = PathBuf::from(dir);
        config.source = ConfigSource::Env;
    }
    if let Some(dir) = env("RELAY_OUTPUTS_DIR") {
        config.storage.outputs_dir = PathBuf::from(dir);
        config.source = ConfigSource::Env;
    }

    config.limits = config.limits.clone().with_env(env);
    if config.limits != before {
        config.source = ConfigSource::Env;
    }

    Ok(())
}

/// Fill in the API key from the environment unless one is already set.
///
/// Lookup order: the configured `api_key_env`, `RELAY_AGENT_API_KEY`,
/// `OPENAI_API_KEY`, `NVIDIA_API_KEY`.
fn resolve_api_key(config: &mut RelayConfig, env: &dyn Fn(&str) -> Option<String>) {
    let from_env = config
        .api_key_env
        .as_deref()
        .into_iter()
        .chain(["RELAY_AGENT_API_KEY", "OPENAI_API_KEY", "NVIDIA_API_KEY"])
        .find_map(|key| env(key).filter(|v| !v.is_empty()));

    if let Some(key) = from_env {
        config.agent.api_key = Some(key);
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Listen address override
    pub bind: Option<SocketAddr>,
    /// Upload directory override
    pub uploads_dir: Option<PathBuf>,
    /// Output directory override
    pub outputs_dir: Option<PathBuf>,
    /// Model override
    pub model: Option<String>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set listen address override
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = Some(bind);
        self
    }

    /// Set upload directory override
    #[must_use]
    pub fn with_uploads_dir(mut self, dir: PathBuf) -> Self {
        self.uploads_dir = Some(dir);
        self
    }

    /// Set output directory override
    #[must_use]
    pub fn with_outputs_dir(mut self, dir: PathBuf) -> Self {
        self.outputs_dir = Some(dir);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut RelayConfig) {
        if self.bind.is_some()
            || self.uploads_dir.is_some()
            || self.outputs_dir.is_some()
            || self.model.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(dir) = &self.uploads_dir {
            config.storage.uploads_dir.clone_from(dir);
        }
        if let Some(dir) = &self.outputs_dir {
            config.storage.outputs_dir.clone_from(dir);
        }
        if let Some(model) = &self.model {
            config.agent.model.clone_from(model);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_map(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.bind.port(), 8000);
        assert_eq!(config.stream.poll_interval, Duration::from_millis(100));
        assert_eq!(config.stream.chunk_delay, Duration::from_millis(300));
        assert_eq!(config.stream.sentence_delimiter, '。');
        assert_eq!(config.task_timeout, Some(Duration::from_secs(300)));
        assert!(config.classifier.heuristic_fallback);
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config =
            load_with_env(Some(PathBuf::from("/nonexistent/relay.toml")), &no_env).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
[server]
bind = "127.0.0.1:9100"

[agent]
model = "local-model"
base_url = "http://localhost:8080/v1"
timeout_secs = 30

[stream]
poll_interval_ms = 50
chunk_delay_ms = 0
sentence_delimiter = "."
task_timeout_secs = 0

[classifier]
heuristic_fallback = false

[storage]
uploads_dir = "/tmp/relay/in"

[limits]
max_messages_per_minute = 5
"#,
        );

        let config = load_with_env(Some(file.path().to_path_buf()), &no_env).unwrap();
        assert_eq!(config.bind, "127.0.0.1:9100".parse::<SocketAddr>().unwrap());
        assert_eq!(config.agent.model, "local-model");
        assert_eq!(config.agent.request_timeout, Duration::from_secs(30));
        assert_eq!(config.stream.poll_interval, Duration::from_millis(50));
        assert_eq!(config.stream.chunk_delay, Duration::ZERO);
        assert_eq!(config.stream.sentence_delimiter, '.');
        assert_eq!(config.task_timeout, None);
        assert!(!config.classifier.heuristic_fallback);
        assert_eq!(config.storage.uploads_dir, PathBuf::from("/tmp/relay/in"));
        assert_eq!(config.storage.outputs_dir, PathBuf::from("outputs"));
        assert_eq!(config.limits.max_messages_per_minute, 5);
        assert_eq!(config.source(), ConfigSource::File);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config("[agent]\nmodel = \"from-file\"\n");
        let env = env_map(&[
            ("RELAY_AGENT_MODEL", "from-env"),
            ("RELAY_CHUNK_DELAY_MS", "10"),
            ("RELAY_HEURISTIC_FALLBACK", "false"),
            ("NVIDIA_API_KEY", "nv-key"),
        ]);

        let config = load_with_env(Some(file.path().to_path_buf()), &env).unwrap();
        assert_eq!(config.agent.model, "from-env");
        assert_eq!(config.stream.chunk_delay, Duration::from_millis(10));
        assert!(!config.classifier.heuristic_fallback);
        assert_eq!(config.agent.api_key.as_deref(), Some("nv-key"));
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_api_key_env_name_from_file() {
        let file = write_config("[agent]\napi_key_env = \"MY_KEY\"\n");
        let env = env_map(&[("MY_KEY", "secret"), ("OPENAI_API_KEY", "other")]);
        let config = load_with_env(Some(file.path().to_path_buf()), &env).unwrap();
        assert_eq!(config.agent.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_api_key_left_unset_without_env() {
        let config = load_with_env(None, &no_env).unwrap();
        assert!(config.agent.api_key.is_none());

        let env = env_map(&[("RELAY_AGENT_API_KEY", "")]);
        let config = load_with_env(None, &env).unwrap();
        assert!(config.agent.api_key.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = write_config("[stream]\nsentence_delimiter = \"ab\"\n");
        assert!(matches!(
            load_with_env(Some(file.path().to_path_buf()), &no_env),
            Err(ConfigError::ValidationError(_))
        ));

        let file = write_config("[stream]\npoll_interval_ms = 0\n");
        assert!(matches!(
            load_with_env(Some(file.path().to_path_buf()), &no_env),
            Err(ConfigError::ValidationError(_))
        ));

        let env = env_map(&[("RELAY_BIND", "not-an-address")]);
        assert!(load_with_env(None, &env).is_err());

        let file = write_config("[stream\n");
        assert!(matches!(
            load_with_env(Some(file.path().to_path_buf()), &no_env),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = RelayConfig::default();
        ConfigOverrides::new()
            .with_bind("127.0.0.1:1234".parse().unwrap())
            .with_outputs_dir(PathBuf::from("/srv/out"))
            .with_model("cli-model".to_string())
            .apply(&mut config);

        assert_eq!(config.bind.port(), 1234);
        assert_eq!(config.storage.outputs_dir, PathBuf::from("/srv/out"));
        assert_eq!(config.agent.model, "cli-model");
        assert_eq!(config.source(), ConfigSource::Cli);

        let mut untouched = RelayConfig::default();
        ConfigOverrides::new().apply(&mut untouched);
        assert_eq!(untouched.source(), ConfigSource::Default);
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::Cli.to_string(), "CLI");
        assert_eq!(ConfigSource::File.to_string(), "config file");
    }
}
