//! Server assembly and lifecycle management.
//!
//! [`McpServer`] wires the backing store, the tool registry, the usage
//! counter and the session manager together. Transports receive a clone and
//! talk to the session manager through it.
//!
//! ## Tool Architecture
//!
//! Tools are defined in `domains/tools/definitions/`. The built-in set is a
//! `ping` tool plus CRUD tools for every configured store collection.
//! **Adding a new tool does NOT require modifying this file!** Pass extra
//! tools to [`McpServer::with_tools`] instead.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::config::Config;
use super::error::Result;
use super::session::SessionManager;
use super::transport::HttpTransport;
use crate::domains::store::{BackingStore, InMemoryStore};
use crate::domains::tools::{ToolCapability, ToolRegistry, UsageCounter, definitions};

/// The main server handle.
#[derive(Clone)]
pub struct McpServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Live sessions and inbound routing.
    sessions: Arc<SessionManager>,

    /// Per-tool invocation counts.
    usage: Arc<UsageCounter>,
}

impl McpServer {
    /// Create a server with the built-in tools over an in-memory store.
    pub fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn BackingStore> =
            Arc::new(InMemoryStore::new(config.store.collections.iter().cloned()));
        let tools = definitions::builtin_tools(store, &config.store.collections);
        Self::with_tools(config, tools)
    }

    /// Create a server exposing exactly `tools`.
    pub fn with_tools<I>(config: Config, tools: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn ToolCapability>>,
    {
        let usage = Arc::new(UsageCounter::new());
        let registry = ToolRegistry::from_tools(tools)?.with_observer(usage.clone());
        info!("Registered {} tool(s)", registry.len());

        let sessions = Arc::new(SessionManager::new(
            Arc::new(registry),
            config.session_options(),
        ));

        Ok(Self {
            config: Arc::new(config),
            sessions,
            usage,
        })
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    /// Get the server configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn usage(&self) -> &Arc<UsageCounter> {
        &self.usage
    }

    /// Start the idle-session reaper, unless reaping is disabled.
    pub fn spawn_reaper(&self, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        let every = self.config.sessions.reap_interval()?;
        info!("Reaping idle sessions every {:?}", every);
        Some(self.sessions.spawn_reaper(every, shutdown))
    }

    /// Serve every enabled transport until `shutdown` is cancelled.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let transport = HttpTransport::new(self.config.transport.clone());
        transport.run(self, shutdown).await?;
        Ok(())
    }
}
