//! Session error types.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by sessions and the session manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A live session already uses this id.
    #[error("Session already exists: {0}")]
    Conflict(String),

    /// No live session has this id.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The envelope is missing required fields or has a malformed payload.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The connection handshake could not be understood.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// The session's outbound queue has been closed.
    #[error("Session closed: {0}")]
    Closed(String),

    /// The operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Too many undelivered messages are queued for the session.
    #[error("Outbound queue full for session {id} ({depth} pending)")]
    QueueFull { id: String, depth: usize },
}

impl SessionError {
    /// Create a new "invalid message" error.
    pub fn invalid_message(msg: impl Into<String>) -> Self {
        Self::InvalidMessage(msg.into())
    }

    /// Create a new "invalid handshake" error.
    pub fn invalid_handshake(msg: impl Into<String>) -> Self {
        Self::InvalidHandshake(msg.into())
    }
}
