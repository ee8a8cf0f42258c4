//! Configuration management for Palaver
//!
//! Handles loading and validating application configuration: upstream
//! connection settings (pool sizing, timeouts, credentials) and session
//! lifecycle settings (TTL, sweep cadence). Values are read once at
//! startup; changing them requires restarting the store and pool.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Bounds on the configured pool size.
pub const MIN_POOL_SIZE: usize = 1;
pub const MAX_POOL_SIZE: usize = 20;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Upstream model API settings
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Session lifecycle settings
    #[serde(default)]
    pub session: SessionSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            session: SessionSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate bounds that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let pool_size = self.upstream.pool_size;
        if !(MIN_POOL_SIZE..=MAX_POOL_SIZE).contains(&pool_size) {
            return Err(Error::Config(format!(
                "upstream.pool_size must be between {} and {}, got {}",
                MIN_POOL_SIZE, MAX_POOL_SIZE, pool_size
            )));
        }
        if self.upstream.request_timeout_secs == 0 {
            return Err(Error::Config(
                "upstream.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.session.ttl_secs == 0 {
            return Err(Error::Config(
                "session.ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.session.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "session.sweep_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Upstream model API configuration with connection pooling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// API key (can be loaded from env)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable name for API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Base URL for the API
    pub base_url: String,
    /// Default model to use
    pub model: String,
    /// Number of connections in the pool (fixed at initialization)
    pub pool_size: usize,
    /// Individual request timeout in seconds; also bounds pool acquisition
    pub request_timeout_secs: u64,
    /// Retry attempts passed through to the upstream client (the pool never retries)
    pub retry_attempts: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            pool_size: 4,
            request_timeout_secs: 60,
            retry_attempts: 2,
        }
    }
}

impl UpstreamConfig {
    /// Get the API key, checking the environment variable if not set directly
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        if let Some(env_var) = &self.api_key_env {
            if let Ok(key) = std::env::var(env_var) {
                if !key.is_empty() {
                    return Some(key);
                }
            }
        }
        None
    }
}

/// Session lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Session TTL in seconds (shared across all interfaces)
    pub ttl_secs: u64,
    /// Interval between expiry sweeps in seconds
    pub sweep_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}
