//! Stateless POST adapter.
//!
//! Accepts exactly one client envelope per request. Replies produced by the
//! handler are not returned in the response body; they are delivered on
//! whichever push transport the session is bound to.

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http::StatusCode;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::error::error_response;
use super::http::AppState;
use crate::core::protocol::{ClientEnvelope, ErrorCode};

/// Handle `POST <message_path>`.
#[instrument(skip_all)]
pub(crate) async fn handle_message(State(state): State<AppState>, body: Bytes) -> Response {
    if body.iter().all(u8::is_ascii_whitespace) {
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidRequest,
            "request body is empty",
        );
    }

    let envelope: ClientEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!("Rejecting unparseable message body: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidRequest,
                format!("request body is not a valid message: {e}"),
            );
        }
    };

    if envelope
        .session_id
        .as_deref()
        .is_none_or(|id| id.trim().is_empty())
    {
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidRequest,
            "message 'sessionId' is required",
        );
    }

    // Not tied to the HTTP connection: the request has already been read in full.
    let cancel = CancellationToken::new();
    match state
        .server
        .sessions()
        .handle_client_message(envelope, cancel)
        .await
    {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))).into_response(),
        Err(err) => err.into_response(),
    }
}
