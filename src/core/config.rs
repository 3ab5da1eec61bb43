//! Configuration management for the session server.
//!
//! This module provides a centralized configuration structure that can be
//! populated from environment variables (optionally via a `.env` file) or
//! defaults.

use super::transport::TransportConfig;
use crate::core::protocol::ServerInfo;
use crate::core::session::SessionOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Main configuration structure for the session server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Session limits and expiry.
    pub sessions: SessionsConfig,

    /// Backing store configuration.
    pub store: StoreConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,

    /// Whether to include timestamps in log output.
    pub with_timestamps: bool,
}

/// Session limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Maximum undelivered messages per session. 0 disables the limit.
    pub max_queue_depth: usize,

    /// Seconds without inbound activity before a session is reaped. 0 disables reaping.
    pub idle_timeout_secs: u64,

    /// Seconds between idle sweeps.
    pub reap_interval_secs: u64,
}

/// Backing store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Collections exposed through CRUD tools.
    pub collections: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "mcp-session-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_timestamps: true,
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: 1024,
            idle_timeout_secs: 1800,
            reap_interval_secs: 60,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collections: ["customers", "orders", "products", "invoices"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl SessionsConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Sweep interval, or `None` when reaping is disabled.
    pub fn reap_interval(&self) -> Option<Duration> {
        self.idle_timeout()?;
        Some(Duration::from_secs(self.reap_interval_secs.max(1)))
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables are expected to be prefixed with `MCP_`.
    /// For example: `MCP_SERVER_NAME`, `MCP_LOG_LEVEL`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Ok(level) = std::env::var("MCP_LOG_LEVEL") {
            config.logging.level = level;
        }

        // Load transport configuration from environment
        config.transport = TransportConfig::from_env();

        if let Some(depth) = parse_var("MCP_SESSION_MAX_QUEUE") {
            config.sessions.max_queue_depth = depth;
        }
        if let Some(secs) = parse_var("MCP_SESSION_IDLE_TIMEOUT") {
            config.sessions.idle_timeout_secs = secs;
        }
        if let Some(secs) = parse_var("MCP_SESSION_REAP_INTERVAL") {
            config.sessions.reap_interval_secs = secs;
        }

        if let Ok(collections) = std::env::var("MCP_STORE_COLLECTIONS") {
            config.store.collections = collections
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
        }

        config
    }

    /// Session manager options derived from this configuration.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            server: ServerInfo {
                name: self.server.name.clone(),
                version: self.server.version.clone(),
            },
            max_queue_depth: self.sessions.max_queue_depth,
            idle_timeout: self.sessions.idle_timeout(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}: '{}' is not a valid value", name, raw);
            None
        }
    }
}
