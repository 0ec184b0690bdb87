//! Configuration loading, validation, and management for Agora.
//!
//! Loads configuration from `~/.agora/config.toml` with environment
//! variable overrides. Validates all settings at startup; the loaded
//! config is read-only for the life of the process (no hot reload).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.agora/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Retry backoff tuning (shared across agents; counts are per-agent)
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Upstream service endpoints/credentials, keyed by agent id
    #[serde(default)]
    pub upstreams: HashMap<String, UpstreamConfig>,

    /// The static agent roster
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Requests per minute allowed per client before 429.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: usize,
}

fn default_port() -> u16 {
    42801
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_rate_limit() -> usize {
    60
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries held before LRU eviction kicks in.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_capacity() -> usize {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// First retry delay in milliseconds; doubles per attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Ceiling on any single computed delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    200
}
fn default_max_delay_ms() -> u64 {
    5_000
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Endpoint and credentials for one agent's upstream service.
///
/// Credentials and URLs are configuration, not design — each upstream is a
/// black box behind its adapter.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model identifier for generative upstreams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Dispatch policy for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent id; must match a known adapter ("insight", "ideation",
    /// "translator").
    pub id: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Budget for a single upstream attempt.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after a retryable failure (total attempts = retry_count + 1).
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// How long a success stays servable from the cache.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_retry_count() -> u32 {
    2
}
fn default_cache_ttl_secs() -> u64 {
    300
}

impl AgentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// The default roster: the three marketplace agents. Upstreams differ
/// wildly in cost and volatility, so each carries its own policy.
fn default_agents() -> Vec<AgentConfig> {
    vec![
        AgentConfig {
            id: "insight".into(),
            enabled: true,
            timeout_secs: 10,
            retry_count: 2,
            cache_ttl_secs: 60,
        },
        AgentConfig {
            id: "ideation".into(),
            enabled: true,
            timeout_secs: 30,
            retry_count: 1,
            cache_ttl_secs: 600,
        },
        AgentConfig {
            id: "translator".into(),
            enabled: true,
            timeout_secs: 15,
            retry_count: 2,
            cache_ttl_secs: 3_600,
        },
    ]
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
            .field("gateway", &self.gateway)
            .field("cache", &self.cache)
            .field("backoff", &self.backoff)
            .field("upstreams", &self.upstreams)
            .field("agents", &self.agents)
            .finish()
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agora/config.toml).
    ///
    /// Environment overrides, applied after the file:
    /// - `AGORA_<AGENT>_API_KEY` / `AGORA_<AGENT>_API_URL` per upstream
    ///   (e.g. `AGORA_TRANSLATOR_API_KEY`)
    /// - `AGORA_API_KEY` as a shared fallback key for upstreams without one
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
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
        let agent_ids: Vec<String> = self.agents.iter().map(|a| a.id.clone()).collect();
        for id in agent_ids {
            let upstream = self.upstreams.entry(id.clone()).or_default();
            let prefix = format!("AGORA_{}", id.to_uppercase());
            if let Ok(key) = std::env::var(format!("{prefix}_API_KEY")) {
                upstream.api_key = Some(key);
            }
            if let Ok(url) = std::env::var(format!("{prefix}_API_URL")) {
                upstream.api_url = Some(url);
            }
        }
        if let Ok(shared) = std::env::var("AGORA_API_KEY") {
            for upstream in self.upstreams.values_mut() {
                if upstream.api_key.is_none() {
                    upstream.api_key = Some(shared.clone());
                }
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agora")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "cache.capacity must be at least 1".into(),
            ));
        }

        if self.backoff.base_delay_ms == 0 || self.backoff.base_delay_ms > self.backoff.max_delay_ms
        {
            return Err(ConfigError::ValidationError(
                "backoff.base_delay_ms must be in 1..=max_delay_ms".into(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for agent in &self.agents {
            if agent.timeout_secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}': timeout_secs must be at least 1",
                    agent.id
                )));
            }
            if !seen.insert(agent.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}' is configured twice",
                    agent.id
                )));
            }
        }

        Ok(())
    }

    /// Upstream settings for one agent, defaulting to an empty entry.
    pub fn upstream(&self, agent_id: &str) -> UpstreamConfig {
        self.upstreams.get(agent_id).cloned().unwrap_or_default()
    }

    /// Generate a default config TOML string (for `onboard`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            cache: CacheConfig::default(),
            backoff: BackoffConfig::default(),
            upstreams: HashMap::new(),
            agents: default_agents(),
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

impl From<ConfigError> for agora_core::Error {
    fn from(err: ConfigError) -> Self {
        agora_core::Error::Config {
            message: err.to_string(),
        }
    }
}
