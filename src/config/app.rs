//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! tunes-rankings service, including environment variable and TOML file
//! loading and validation.

use crate::config::rankings::RankingsSettings;
use crate::config::storage::{RemoteKvSettings, StorageSettings};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub storage: StorageSettings,
    pub rankings: RankingsSettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and health reports
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Address the HTTP server binds to
    pub host: String,
    /// Port for the HTTP API, health and metrics endpoints
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "tunes-rankings".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, value))
}

/// Read a REST KV endpoint from a URL/token variable pair
fn remote_kv_from(
    lookup: &impl Fn(&str) -> Option<String>,
    url_var: &str,
    token_var: &str,
) -> Result<Option<RemoteKvSettings>> {
    match (lookup(url_var), lookup(token_var)) {
        (Some(url), Some(token)) => Ok(Some(RemoteKvSettings { url, token })),
        (None, None) => Ok(None),
        _ => Err(anyhow!("{} and {} must be set together", url_var, token_var)),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let base: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        base.with_overrides(|name| env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Self::default().with_overrides(lookup)
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Service settings
        if let Some(name) = lookup("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Some(host) = lookup("HTTP_HOST") {
            self.service.host = host;
        }
        if let Some(port) = lookup("HTTP_PORT") {
            self.service.http_port = parse_var("HTTP_PORT", &port)?;
        }
        if let Some(timeout) = lookup("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds =
                parse_var("SHUTDOWN_TIMEOUT_SECONDS", &timeout)?;
        }

        // Storage settings
        if let Some(primary) = remote_kv_from(&lookup, "KV_REST_API_URL", "KV_REST_API_TOKEN")? {
            self.storage.primary_kv = Some(primary);
        }
        if let Some(secondary) = remote_kv_from(
            &lookup,
            "UPSTASH_REDIS_REST_URL",
            "UPSTASH_REDIS_REST_TOKEN",
        )? {
            self.storage.secondary_kv = Some(secondary);
        }
        if let Some(dir) = lookup("RANKINGS_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(prefix) = lookup("STORAGE_KEY_PREFIX") {
            self.storage.key_prefix = prefix;
        }
        if let Some(timeout) = lookup("BACKEND_TIMEOUT_MS") {
            self.storage.backend_timeout_ms = parse_var("BACKEND_TIMEOUT_MS", &timeout)?;
        }

        // Rankings settings
        if let Some(id) = lookup("COLLECTION_ID") {
            self.rankings.collection_id = id;
        }
        if let Some(name) = lookup("COLLECTION_NAME") {
            self.rankings.collection_name = name;
        }
        if let Some(path) = lookup("TRACKS_FILE") {
            self.rankings.tracks_file = Some(PathBuf::from(path));
        }
        if let Some(attempts) = lookup("MAX_VOTE_ATTEMPTS") {
            self.rankings.max_vote_attempts = parse_var("MAX_VOTE_ATTEMPTS", &attempts)?;
        }

        validate_config(&self)?;
        Ok(self)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get the per-attempt storage timeout as Duration
    pub fn backend_timeout(&self) -> Duration {
        self.storage.backend_timeout()
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.storage.backend_timeout_ms == 0 {
        return Err(anyhow!("Backend timeout must be greater than 0"));
    }

    // Validate remote backends
    for (label, kv) in [
        ("primary_kv", &config.storage.primary_kv),
        ("secondary_kv", &config.storage.secondary_kv),
    ] {
        if let Some(kv) = kv {
            if !(kv.url.starts_with("http://") || kv.url.starts_with("https://")) {
                return Err(anyhow!("{} URL must be http(s): {}", label, kv.url));
            }
            if kv.token.is_empty() {
                return Err(anyhow!("{} token cannot be empty", label));
            }
        }
    }

    // Validate rankings settings
    if config.rankings.collection_id.trim().is_empty() {
        return Err(anyhow!("Collection id cannot be empty"));
    }
    if config.rankings.max_vote_attempts == 0 {
        return Err(anyhow!("Max vote attempts must be greater than 0"));
    }

    Ok(())
}
