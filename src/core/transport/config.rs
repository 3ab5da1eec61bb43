//! Transport configuration types.

use serde::{Deserialize, Serialize};

/// HTTP transport configuration.
///
/// All three adapters share one listener; each is mounted on its own path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Port number to listen on.
    pub port: u16,

    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Path of the server-sent events endpoint (GET).
    #[serde(default = "default_sse_path")]
    pub sse_path: String,

    /// Path of the WebSocket endpoint (GET + upgrade).
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Path of the stateless message endpoint (POST).
    #[serde(default = "default_message_path")]
    pub message_path: String,

    /// Enable CORS for browser clients.
    #[serde(default = "default_cors")]
    pub enable_cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_sse_path() -> String {
    "/sse".to_string()
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_message_path() -> String {
    "/message".to_string()
}

fn default_cors() -> bool {
    true
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: default_host(),
            sse_path: default_sse_path(),
            ws_path: default_ws_path(),
            message_path: default_message_path(),
            enable_cors: default_cors(),
        }
    }
}

impl TransportConfig {
    /// Create a config listening on the given port and host.
    pub fn new(port: u16, host: impl Into<String>) -> Self {
        Self {
            port,
            host: host.into(),
            ..Default::default()
        }
    }

    /// Load transport config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: std::env::var("MCP_HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            host: std::env::var("MCP_HTTP_HOST").unwrap_or(defaults.host),
            sse_path: std::env::var("MCP_SSE_PATH").unwrap_or(defaults.sse_path),
            ws_path: std::env::var("MCP_WS_PATH").unwrap_or(defaults.ws_path),
            message_path: std::env::var("MCP_MESSAGE_PATH").unwrap_or(defaults.message_path),
            enable_cors: std::env::var("MCP_HTTP_CORS")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.enable_cors),
        }
    }

    /// Get the bind address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get a description of this transport for logging.
    pub fn description(&self) -> String {
        let mut endpoints = Vec::new();
        if cfg!(feature = "sse") {
            endpoints.push(format!("SSE {}", self.sse_path));
        }
        if cfg!(feature = "websocket") {
            endpoints.push(format!("WebSocket {}", self.ws_path));
        }
        endpoints.push(format!("POST {}", self.message_path));
        format!("HTTP on {} ({})", self.address(), endpoints.join(", "))
    }
}
