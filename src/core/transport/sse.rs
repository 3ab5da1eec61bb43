//! Server-sent events adapter.
//!
//! Push-only: the client opens `GET <sse_path>`, receives a comment naming its
//! session, then one `event:`/`data:` frame per outbound message. Client
//! messages for the session arrive through the POST endpoint.

use axum::{
    extract::{RawQuery, State},
    http::HeaderMap,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{StreamExt, stream};
use std::convert::Infallible;
use tracing::{info, instrument, warn};

use super::connection::ConnectionGuard;
use super::handshake::{SESSION_ID_HEADER, handshake_from_request};
use super::http::AppState;
use crate::core::protocol::{ServerMessage, TransportKind};

/// Handle `GET <sse_path>`.
#[instrument(skip_all)]
pub(crate) async fn handle_sse(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let handshake = match handshake_from_request(query.as_deref(), &headers) {
        Ok(handshake) => handshake,
        Err(err) => {
            warn!("Rejecting event stream handshake: {}", err);
            return err.into_response();
        }
    };

    let sessions = state.server.sessions().clone();
    let session = match sessions.create_session(handshake, TransportKind::EventStream) {
        Ok(session) => session,
        Err(err) => return err.into_response(),
    };
    info!("Event stream opened for session {}", session.id());

    let guard = ConnectionGuard::new(sessions, session.clone());
    let announce = Event::default().comment(format!("session {}", session.id()));
    let outbound = session
        .read_outbound(guard.scope().clone())
        .map(move |message| Ok::<_, Infallible>(frame(&guard, &message)));
    let events = stream::once(async move { Ok(announce) }).chain(outbound);

    (
        [(SESSION_ID_HEADER, session.id().to_string())],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

/// Encode one message as an SSE frame named after its type.
fn frame(guard: &ConnectionGuard, message: &ServerMessage) -> Event {
    Event::default()
        .event(message.kind())
        .json_data(message)
        .unwrap_or_else(|e| {
            warn!(
                "Failed to encode {} for session {}: {}",
                message.kind(),
                guard.session().id(),
                e
            );
            Event::default().comment("dropped unencodable message")
        })
}
