//! Error types and handling for the session server.
//!
//! This module defines the error type returned while assembling and running
//! the server. Per-request failures stay in their domain error types and are
//! answered in-band or as HTTP statuses by the transports.

use thiserror::Error;

/// A specialized Result type for server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the session server.
#[derive(Debug, Error)]
pub enum Error {
    /// The tool set could not be registered.
    #[error("Tool error: {0}")]
    Tool(#[from] crate::domains::tools::ToolError),

    /// Listener or connection failure.
    #[error("Transport error: {0}")]
    Transport(#[from] crate::core::transport::TransportError),
}
