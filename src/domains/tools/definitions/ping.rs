//! Ping tool definition.
//!
//! A liveness tool that takes no input and echoes the server time.

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domains::tools::{ToolArguments, ToolCapability, ToolResult};

/// Ping tool - answers with a timestamp.
#[derive(Debug, Default, Clone, Copy)]
pub struct PingTool;

impl PingTool {
    /// Tool name as registered.
    pub const NAME: &'static str = "ping";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str =
        "Check that the server is responsive. Takes no arguments and returns the server time.";
}

#[async_trait::async_trait]
impl ToolCapability for PingTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        Self::DESCRIPTION
    }

    async fn invoke(&self, _arguments: ToolArguments, _cancel: CancellationToken) -> ToolResult {
        debug!("Ping tool called");
        Ok(json!({
            "pong": true,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    }
}
