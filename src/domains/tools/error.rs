//! Tool-specific error types.

use thiserror::Error;

/// Errors that can occur during tool registration or invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// The requested tool was not found.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// A tool was registered with an empty or whitespace-only name.
    #[error("Invalid tool name: {0:?}")]
    InvalidName(String),

    /// Invalid arguments were provided to the tool.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The entity the tool operated on does not exist.
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// The tool's operation conflicts with existing state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The tool execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// The invocation was cancelled before it completed.
    #[error("Tool invocation cancelled")]
    Cancelled,
}

impl ToolError {
    /// Create a new "not found" error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a new "invalid arguments" error.
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a new "entity not found" error.
    pub fn entity_not_found(msg: impl Into<String>) -> Self {
        Self::EntityNotFound(msg.into())
    }

    /// Create a new "conflict" error.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a new "execution failed" error.
    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }
}
