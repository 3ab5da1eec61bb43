//! Transport error types.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

use crate::core::protocol::ErrorCode;
use crate::core::session::SessionError;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur in transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to bind to address.
    #[error("Failed to bind to {address}: {source}")]
    BindError {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP-specific error.
    #[error("HTTP error: {0}")]
    HttpError(String),
}

impl TransportError {
    /// Create a bind error.
    pub fn bind(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::BindError {
            address: address.into(),
            source,
        }
    }

    /// Create an HTTP error.
    pub fn http(msg: impl Into<String>) -> Self {
        Self::HttpError(msg.into())
    }
}

/// JSON error body used for every transport-level rejection.
pub fn error_response(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Response {
    let body = json!({
        "error": {
            "code": code,
            "message": message.into()
        }
    });
    (status, Json(body)).into_response()
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SessionError::Conflict(_) => StatusCode::CONFLICT,
            SessionError::NotFound(_) | SessionError::Closed(_) => StatusCode::NOT_FOUND,
            SessionError::InvalidMessage(_) | SessionError::InvalidHandshake(_) => {
                StatusCode::BAD_REQUEST
            }
            SessionError::Cancelled | SessionError::QueueFull { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        let code = match &self {
            SessionError::Conflict(_) => ErrorCode::Conflict,
            other => ErrorCode::from(other),
        };
        error_response(status, code, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_status_codes() {
        let cases = [
            (SessionError::Conflict("s".into()), StatusCode::CONFLICT),
            (SessionError::NotFound("s".into()), StatusCode::NOT_FOUND),
            (SessionError::invalid_message("x"), StatusCode::BAD_REQUEST),
            (SessionError::invalid_handshake("x"), StatusCode::BAD_REQUEST),
            (
                SessionError::QueueFull { id: "s".into(), depth: 1 },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
