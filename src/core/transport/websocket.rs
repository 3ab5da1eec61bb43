//! WebSocket adapter.
//!
//! One socket is bound to one session. A send loop drains the session's
//! outbound queue into text frames while a receive loop decodes client
//! envelopes and hands them to the session manager. Both loops share a
//! cancellation scope: whichever ends first stops the other, then the socket
//! is closed and the session completed.

use axum::{
    extract::{
        RawQuery, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::{
    FutureExt, SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ConnectionGuard;
use super::handshake::handshake_from_request;
use super::http::AppState;
use crate::core::protocol::{ClientEnvelope, ErrorCode, ServerEvent, TransportKind};
use crate::core::session::{Session, SessionError, SessionManager};

/// Handle `GET <ws_path>` with an upgrade request.
#[instrument(skip_all)]
pub(crate) async fn handle_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let handshake = match handshake_from_request(query.as_deref(), &headers) {
        Ok(handshake) => handshake,
        Err(err) => {
            warn!("Rejecting WebSocket handshake: {}", err);
            return err.into_response();
        }
    };

    let sessions = state.server.sessions().clone();
    let session = match sessions.create_session(handshake, TransportKind::WebSocket) {
        Ok(session) => session,
        Err(err) => return err.into_response(),
    };

    // Owned by the upgrade callback, so a failed upgrade drops it too.
    let guard = ConnectionGuard::new(sessions, session.clone());
    ws.on_failed_upgrade(|e| warn!("WebSocket upgrade failed: {}", e))
        .on_upgrade(move |socket| run_socket(socket, session, guard))
}

async fn run_socket(socket: WebSocket, session: Arc<Session>, guard: ConnectionGuard) {
    info!("WebSocket opened for session {}", session.id());
    let scope = guard.scope().clone();
    let (sink, stream) = socket.split();

    let send = async {
        let sink = send_loop(sink, &session, scope.clone()).await;
        scope.cancel();
        sink
    };
    let receive = async {
        receive_loop(stream, &session, guard.sessions(), scope.clone()).await;
        scope.cancel();
    };
    let (mut sink, ()) = tokio::join!(send, receive);

    let close = Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: Utf8Bytes::from_static("session closed"),
    }));
    if let Err(e) = sink.send(close).await {
        debug!("Close handshake for session {} failed: {}", session.id(), e);
    }
    info!("WebSocket closed for session {}", session.id());
    drop(guard);
}

/// Forward outbound messages until the queue ends, the scope is cancelled,
/// or a write fails. Returns the sink for the close handshake.
async fn send_loop(
    mut sink: SplitSink<WebSocket, Message>,
    session: &Arc<Session>,
    scope: CancellationToken,
) -> SplitSink<WebSocket, Message> {
    let mut outbound = std::pin::pin!(session.read_outbound(scope));
    while let Some(message) = outbound.next().await {
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode {} for session {}: {}", message.kind(), session.id(), e);
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            debug!("WebSocket write for session {} failed: {}", session.id(), e);
            break;
        }
    }
    sink
}

/// Read client frames until the peer closes, a read fails, or the scope is
/// cancelled. Each envelope is handled on its own task; tasks still running
/// when the loop ends are aborted.
async fn receive_loop(
    mut stream: SplitStream<WebSocket>,
    session: &Arc<Session>,
    sessions: &Arc<SessionManager>,
    scope: CancellationToken,
) {
    let mut in_flight = JoinSet::new();
    loop {
        let frame = tokio::select! {
            _ = scope.cancelled() => break,
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => continue,
            frame = stream.next() => frame,
        };

        let text = match frame {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    session.try_send(
                        ServerEvent::error(ErrorCode::InvalidRequest, "binary frame is not UTF-8"),
                        None,
                    );
                    continue;
                }
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!("WebSocket read for session {} failed: {}", session.id(), e);
                break;
            }
        };

        let envelope = match decode_envelope(&text, session.id()) {
            Ok(envelope) => envelope,
            Err(event) => {
                session.try_send(event, None);
                continue;
            }
        };

        let session = Arc::clone(session);
        let sessions = Arc::clone(sessions);
        let cancel = scope.child_token();
        in_flight.spawn(async move {
            let request_id = envelope.request_id.clone();
            let handled = AssertUnwindSafe(sessions.handle_client_message(envelope, cancel))
                .catch_unwind()
                .await;
            let reply = match handled {
                Ok(Ok(())) => None,
                Ok(Err(err)) => in_band_error(&err),
                Err(_) => {
                    warn!("Message handler for session {} panicked", session.id());
                    Some(ServerEvent::error(
                        ErrorCode::InternalError,
                        "internal error while handling message",
                    ))
                }
            };
            if let Some(event) = reply {
                session.try_send(event, request_id);
            }
        });
    }
}

/// Parse one text frame, binding it to `session_id` when it names no session.
fn decode_envelope(text: &str, session_id: &str) -> Result<ClientEnvelope, ServerEvent> {
    let mut envelope: ClientEnvelope = serde_json::from_str(text).map_err(|e| {
        ServerEvent::error(
            ErrorCode::InvalidRequest,
            format!("message is not valid JSON: {e}"),
        )
    })?;
    if envelope
        .session_id
        .as_deref()
        .is_none_or(|id| id.trim().is_empty())
    {
        envelope.session_id = Some(session_id.to_string());
    }
    Ok(envelope)
}

/// The in-band reply for a failed dispatch, if the session can still take one.
fn in_band_error(err: &SessionError) -> Option<ServerEvent> {
    match err {
        SessionError::Closed(_) | SessionError::Cancelled => None,
        other => Some(ServerEvent::error(ErrorCode::from(other), other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_defaults_session_id() {
        let envelope = decode_envelope(r#"{"type":"ping","requestId":7}"#, "s1").unwrap();
        assert_eq!(envelope.session_id.as_deref(), Some("s1"));
        assert_eq!(envelope.request_id.as_deref(), Some("7"));

        let envelope = decode_envelope(r#"{"type":"ping","sessionId":""}"#, "s1").unwrap();
        assert_eq!(envelope.session_id.as_deref(), Some("s1"));

        let envelope = decode_envelope(r#"{"type":"ping","sessionId":"other"}"#, "s1").unwrap();
        assert_eq!(envelope.session_id.as_deref(), Some("other"));
    }

    #[test]
    fn test_decode_malformed_json_is_in_band_error() {
        let Err(ServerEvent::Error(payload)) = decode_envelope("{not json", "s1") else {
            panic!("expected an error event");
        };
        assert_eq!(payload.code, ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_in_band_error_mapping() {
        let not_found = in_band_error(&SessionError::NotFound("x".into())).unwrap();
        let ServerEvent::Error(payload) = not_found else {
            panic!("expected an error event");
        };
        assert_eq!(payload.code, ErrorCode::SessionNotFound);

        let invalid = in_band_error(&SessionError::invalid_message("bad")).unwrap();
        assert_eq!(invalid.kind(), "error");

        assert!(in_band_error(&SessionError::Closed("x".into())).is_none());
        assert!(in_band_error(&SessionError::Cancelled).is_none());
    }

    mod socket {
        use crate::core::config::Config;
        use crate::core::server::McpServer;
        use crate::core::transport::HttpTransport;
        use futures::{SinkExt, StreamExt};
        use serde_json::Value;
        use std::net::SocketAddr;
        use std::time::Duration;
        use tokio::net::{TcpListener, TcpStream};
        use tokio_tungstenite::tungstenite::Message as ClientMessage;
        use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
        use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

        type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

        async fn serve() -> (McpServer, SocketAddr) {
            let server = McpServer::new(Config::default()).unwrap();
            let app = HttpTransport::new(server.config().transport.clone()).router(server.clone());
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            (server, addr)
        }

        async fn connect(addr: SocketAddr, session_id: &str) -> Client {
            let url = format!("ws://{addr}/ws?sessionId={session_id}");
            let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
            client
        }

        async fn next_json(client: &mut Client) -> Value {
            let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            let ClientMessage::Text(text) = frame else {
                panic!("expected a text frame, got {frame:?}");
            };
            serde_json::from_str(text.as_str()).unwrap()
        }

        async fn send(client: &mut Client, text: &str) {
            client.send(ClientMessage::text(text.to_owned())).await.unwrap();
        }

        #[tokio::test]
        async fn test_socket_round_trip() {
            let (server, addr) = serve().await;
            let mut client = connect(addr, "w1").await;

            let created = next_json(&mut client).await;
            assert_eq!(created["type"], "session.created");
            assert_eq!(created["sessionId"], "w1");
            assert_eq!(created["payload"]["transport"], "websocket");
            assert_eq!(next_json(&mut client).await["type"], "tools.list");

            // No sessionId: the frame belongs to the socket's session.
            send(&mut client, r#"{"type":"ping","requestId":"p1"}"#).await;
            let pong = next_json(&mut client).await;
            assert_eq!(pong["type"], "pong");
            assert_eq!(pong["requestId"], "p1");

            send(&mut client, "{bad").await;
            let error = next_json(&mut client).await;
            assert_eq!(error["type"], "error");
            assert_eq!(error["payload"]["code"], "invalid_request");

            send(&mut client, r#"{"type":"ping","requestId":"p2"}"#).await;
            assert_eq!(next_json(&mut client).await["requestId"], "p2");

            server.sessions().complete_session("w1");
            let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            let ClientMessage::Close(Some(close)) = frame else {
                panic!("expected a close frame, got {frame:?}");
            };
            assert_eq!(close.code, CloseCode::Normal);
        }

        #[tokio::test]
        async fn test_peer_close_completes_session() {
            let (server, addr) = serve().await;
            let mut client = connect(addr, "w2").await;
            next_json(&mut client).await;
            let session = server.sessions().get("w2").unwrap();

            client.close(None).await.unwrap();

            tokio::time::timeout(Duration::from_secs(5), async {
                while server.sessions().get("w2").is_some() {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await
            .unwrap();
            assert!(session.is_completed());
        }
    }
}
