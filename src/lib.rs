//! MCP Session Server Library
//!
//! The session and protocol layer of a tool-invocation server. Remote clients
//! open a session over server-sent events, a WebSocket or plain HTTP POST,
//! discover named tools with JSON-schema described inputs, and invoke them
//! asynchronously. Results and errors come back as messages on the session,
//! correlated by request id.
//!
//! # Architecture
//!
//! - **core**: Configuration, errors, the wire protocol, sessions, server assembly and transports
//! - **domains**: Business logic organized by bounded contexts
//!   - **tools**: Tool capabilities, the registry and usage observation
//!   - **store**: The backing store the CRUD tools proxy into
//!
//! # Example
//!
//! ```rust,no_run
//! use mcp_session_server::core::{Config, HttpTransport, McpServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let server = McpServer::new(config.clone())?;
//!     HttpTransport::new(config.transport)
//!         .run(server, CancellationToken::new())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, McpServer, Result};
