//! Session manager: session table, lifecycle and inbound routing.
//!
//! Per session id the lifecycle is `absent → created → completed`. Creation
//! with an id that is already live fails with [`SessionError::Conflict`] and
//! never replaces the existing session.
//!
//! Expected protocol conditions (unknown tool, bad arguments, unknown message
//! type) are answered with an in-band `error` message on the session's
//! outbound queue. Only failures that happen before a session can be located
//! are returned to the caller.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::error::{SessionError, SessionResult};
use super::session::Session;
use crate::core::protocol::{
    ClientEnvelope, ClientRequest, ErrorCode, InvokeRequest, McpHandshake, Pong, ServerEvent,
    ServerInfo, SessionCreated, ToolResultPayload, ToolsList, TransportKind,
    negotiate_protocol_version,
};
use crate::domains::tools::{ToolRegistry, ToolResult};

/// Tunables for sessions created by a [`SessionManager`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Server identity announced in `session.created`.
    pub server: ServerInfo,

    /// Maximum undelivered outbound messages per session (0 = unbounded).
    pub max_queue_depth: usize,

    /// Sessions idle for longer than this are reaped. `None` disables reaping.
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            server: ServerInfo {
                name: "mcp-session-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            max_queue_depth: 1024,
            idle_timeout: Some(Duration::from_secs(30 * 60)),
        }
    }
}

/// Owns the live session table and the tool registry.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    registry: Arc<ToolRegistry>,
    options: SessionOptions,
}

impl SessionManager {
    pub fn new(registry: Arc<ToolRegistry>, options: SessionOptions) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            registry,
            options,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Look up a live session.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create and register a session for a completed transport handshake.
    ///
    /// The new session's queue starts with a `session.created` message and a
    /// `tools.list` snapshot.
    #[instrument(skip(self, handshake), fields(session_id))]
    pub fn create_session(
        &self,
        handshake: McpHandshake,
        transport: TransportKind,
    ) -> SessionResult<Arc<Session>> {
        let protocol_version = negotiate_protocol_version(&handshake.protocol_version);
        let requested = handshake.requested_session_id().map(str::to_string);

        let session = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            let id = match requested {
                Some(id) if sessions.contains_key(&id) => {
                    warn!("Rejecting duplicate session id: {}", id);
                    return Err(SessionError::Conflict(id));
                }
                Some(id) => id,
                None => loop {
                    let id = uuid::Uuid::new_v4().simple().to_string();
                    if !sessions.contains_key(&id) {
                        break id;
                    }
                },
            };

            let session = Arc::new(Session::new(
                id.clone(),
                handshake,
                protocol_version,
                transport,
                self.options.max_queue_depth,
            ));
            sessions.insert(id, session.clone());
            session
        };
        tracing::Span::current().record("session_id", session.id());

        let handshake = session.handshake();
        let created = SessionCreated {
            session_id: session.id().to_string(),
            transport,
            protocol_version: protocol_version.to_string(),
            client_name: handshake.client_name.clone(),
            client_version: handshake.client_version.clone(),
            capabilities: handshake
                .capabilities
                .clone()
                .filter(|capabilities| !capabilities.is_empty()),
            server: self.options.server.clone(),
        };
        let tools = ToolsList {
            tools: self.registry.describe(),
        };
        if !session.try_send(ServerEvent::SessionCreated(created), None)
            || !session.try_send(ServerEvent::ToolsList(tools), None)
        {
            warn!("Failed to queue initial messages for session {}", session.id());
        }

        info!(
            "Session {} created ({}, protocol {})",
            session.id(),
            transport,
            protocol_version
        );
        Ok(session)
    }

    /// Remove a session and close its queue.
    ///
    /// Returns whether a live session was removed; unknown ids are ignored.
    pub fn complete_session(&self, id: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);

        match removed {
            Some(session) => {
                session.complete(None);
                info!("Session {} completed", id);
                true
            }
            None => {
                debug!("Ignoring completion of unknown session {}", id);
                false
            }
        }
    }

    /// Complete `session` only if it is still the live entry for its id.
    ///
    /// A newer session that reused the id is left alone. The given session's
    /// queue is closed either way.
    pub fn complete_session_if(&self, session: &Arc<Session>) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            match sessions.get(session.id()) {
                Some(live) if Arc::ptr_eq(live, session) => sessions.remove(session.id()),
                _ => None,
            }
        };

        session.complete(None);
        if removed.is_some() {
            info!("Session {} completed", session.id());
            true
        } else {
            debug!("Session {} was already replaced or removed", session.id());
            false
        }
    }

    /// Route one client envelope.
    ///
    /// Fails with [`SessionError::InvalidMessage`] when `type` or `sessionId`
    /// is missing or blank, or an `invoke` payload is malformed, and with
    /// [`SessionError::NotFound`] when the session is not live. Everything
    /// else is answered on the session's outbound queue.
    #[instrument(skip_all, fields(session_id, kind))]
    pub async fn handle_client_message(
        &self,
        envelope: ClientEnvelope,
        cancel: CancellationToken,
    ) -> SessionResult<()> {
        let ClientEnvelope {
            session_id,
            kind,
            request_id,
            payload,
        } = envelope;

        let kind = non_blank(kind.as_deref())
            .ok_or_else(|| SessionError::invalid_message("message 'type' is required"))?;
        let session_id = non_blank(session_id.as_deref())
            .ok_or_else(|| SessionError::invalid_message("message 'sessionId' is required"))?;
        let span = tracing::Span::current();
        span.record("session_id", session_id);
        span.record("kind", kind);

        let session = self
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        session.touch();

        let event = match ClientRequest::parse(kind, payload)? {
            ClientRequest::Ping => ServerEvent::Pong(Pong::now()),
            ClientRequest::ToolsList => ServerEvent::ToolsList(ToolsList {
                tools: self.registry.describe(),
            }),
            ClientRequest::Invoke(request) => self.invoke_tool(&session, request, &cancel).await,
            ClientRequest::Unknown(other) => {
                debug!("Unknown message type: {}", other);
                ServerEvent::error(
                    ErrorCode::UnknownType,
                    format!("Unknown message type: {}", other),
                )
            }
        };

        session.send(event, request_id, &cancel).await
    }

    /// Run a tool and turn its outcome into a `tool.result` or `error` event.
    async fn invoke_tool(
        &self,
        session: &Session,
        request: InvokeRequest,
        cancel: &CancellationToken,
    ) -> ServerEvent {
        let InvokeRequest { name, arguments } = request;

        // Fires when either the caller gives up or the session completes.
        // The registry sees the cancellation itself so it is counted.
        let invocation = session.lifetime().child_token();
        let relay = async {
            cancel.cancelled().await;
            invocation.cancel();
            std::future::pending::<ToolResult>().await
        };
        let outcome = tokio::select! {
            result = self.registry.invoke(&name, arguments, invocation.clone()) => result,
            result = relay => result,
        };

        match outcome {
            Ok(result) => ServerEvent::ToolResult(ToolResultPayload { tool: name, result }),
            Err(err) => {
                warn!("Tool '{}' failed: {}", name, err);
                ServerEvent::error(ErrorCode::from(&err), err.to_string())
            }
        }
    }

    /// Complete every session idle for longer than the configured timeout.
    ///
    /// Expiry is decided and the entries removed under one write lock.
    /// Returns the ids of the reaped sessions.
    pub fn reap_idle(&self) -> Vec<String> {
        let Some(timeout) = self.options.idle_timeout else {
            return Vec::new();
        };
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);

        let expired: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            let now = Utc::now();
            let ids: Vec<String> = sessions
                .values()
                .filter(|session| (now - session.last_activity()).num_milliseconds() > timeout_ms)
                .map(|session| session.id().to_string())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        expired
            .into_iter()
            .map(|session| {
                info!("Reaping idle session {}", session.id());
                session.complete(Some("idle"));
                session.id().to_string()
            })
            .collect()
    }

    /// Periodically reap idle sessions until `shutdown` fires.
    pub fn spawn_reaper(
        self: &Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        manager.reap_idle();
                    }
                }
            }
            debug!("Session reaper stopped");
        })
    }

    /// Complete every live session.
    pub fn complete_all(&self) {
        let drained: Vec<Arc<Session>> = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, session)| session)
            .collect();
        for session in drained {
            session.complete(Some("shutdown"));
            info!("Session {} completed", session.id());
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::ServerMessage;
    use crate::domains::tools::definitions::PingTool;
    use crate::domains::tools::{ToolArguments, ToolCapability, ToolError, UsageCounter};
    use futures::StreamExt;
    use serde_json::{Value, json};
    use std::collections::HashSet;

    /// Sleeps for `delay_ms` then echoes its arguments.
    struct SlowEcho;

    #[async_trait::async_trait]
    impl ToolCapability for SlowEcho {
        fn name(&self) -> &str {
            "slow_echo"
        }

        fn description(&self) -> &str {
            "Echo after a delay"
        }

        async fn invoke(&self, arguments: ToolArguments, cancel: CancellationToken) -> ToolResult {
            let arguments = arguments.unwrap_or_default();
            let delay = arguments.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(delay)) => Ok(Value::Object(arguments)),
                _ = cancel.cancelled() => Err(ToolError::Cancelled),
            }
        }
    }

    struct Exploding;

    #[async_trait::async_trait]
    impl ToolCapability for Exploding {
        fn name(&self) -> &str {
            "explode"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        async fn invoke(&self, _arguments: ToolArguments, _cancel: CancellationToken) -> ToolResult {
            Err(ToolError::execution_failed("kaboom"))
        }
    }

    fn manager() -> Arc<SessionManager> {
        let registry = ToolRegistry::from_tools([
            Arc::new(PingTool) as Arc<dyn ToolCapability>,
            Arc::new(SlowEcho),
            Arc::new(Exploding),
        ])
        .unwrap();
        Arc::new(SessionManager::new(
            Arc::new(registry),
            SessionOptions::default(),
        ))
    }

    async fn next_message(session: &Arc<Session>) -> ServerMessage {
        Box::pin(session.read_outbound(CancellationToken::new()))
            .next()
            .await
            .unwrap()
    }

    /// Create a session and drain its two startup messages.
    async fn open(manager: &SessionManager, id: &str) -> Arc<Session> {
        let session = manager
            .create_session(McpHandshake::new("").with_session_id(id), TransportKind::WebSocket)
            .unwrap();
        next_message(&session).await;
        next_message(&session).await;
        session
    }

    fn invoke(session: &str, request_id: &str, payload: Value) -> ClientEnvelope {
        ClientEnvelope::new("invoke")
            .with_session(session)
            .with_request_id(request_id)
            .with_payload(payload)
    }

    #[tokio::test]
    async fn test_create_session_pushes_created_and_tool_list() {
        let manager = manager();
        let mut handshake = McpHandshake::new("2024-11-05");
        handshake.client_name = Some("cli".to_string());
        handshake.client_version = Some("1.2".to_string());
        handshake.capabilities = Some(serde_json::Map::new());

        let session = manager
            .create_session(handshake, TransportKind::EventStream)
            .unwrap();

        let created = next_message(&session).await;
        let ServerEvent::SessionCreated(payload) = created.event else {
            panic!("expected session.created");
        };
        assert_eq!(payload.session_id, session.id());
        assert_eq!(payload.transport, TransportKind::EventStream);
        assert_eq!(payload.protocol_version, "2024-11-05");
        assert_eq!(payload.client_name.as_deref(), Some("cli"));
        assert_eq!(payload.client_version.as_deref(), Some("1.2"));
        assert!(payload.capabilities.is_none());
        assert!(created.correlation_id.is_none());

        let tools = next_message(&session).await;
        let ServerEvent::ToolsList(list) = tools.event else {
            panic!("expected tools.list");
        };
        let names: Vec<_> = list.tools.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["explode", "ping", "slow_echo"]);
    }

    #[tokio::test]
    async fn test_generated_ids_are_unique_and_reuse_conflicts() {
        let manager = manager();
        let mut seen = HashSet::new();
        for _ in 0..50 {
            let session = manager
                .create_session(McpHandshake::default(), TransportKind::EventStream)
                .unwrap();
            assert!(seen.insert(session.id().to_string()));

            let err = manager
                .create_session(
                    McpHandshake::default().with_session_id(session.id()),
                    TransportKind::WebSocket,
                )
                .unwrap_err();
            assert_eq!(err, SessionError::Conflict(session.id().to_string()));
        }
        assert_eq!(manager.len(), 50);
    }

    #[tokio::test]
    async fn test_duplicate_id_keeps_original_session() {
        let manager = manager();
        let first = manager
            .create_session(McpHandshake::default().with_session_id(" s1 "), TransportKind::EventStream)
            .unwrap();
        assert_eq!(first.id(), "s1");

        let err = manager
            .create_session(McpHandshake::default().with_session_id("s1"), TransportKind::WebSocket)
            .unwrap_err();
        assert_eq!(err, SessionError::Conflict("s1".to_string()));

        let live = manager.get("s1").unwrap();
        assert!(Arc::ptr_eq(&live, &first));
        assert!(!first.is_completed());
    }

    #[tokio::test]
    async fn test_complete_unknown_session_is_noop() {
        let manager = manager();
        let session = open(&manager, "s1").await;

        assert!(!manager.complete_session("never-created"));
        assert_eq!(manager.len(), 1);

        assert!(manager.complete_session("s1"));
        assert!(session.is_completed());
        assert!(!manager.complete_session("s1"));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_completed_id_can_be_reused() {
        let manager = manager();
        open(&manager, "s1").await;
        manager.complete_session("s1");
        assert!(manager
            .create_session(McpHandshake::default().with_session_id("s1"), TransportKind::None)
            .is_ok());
    }

    #[tokio::test]
    async fn test_missing_type_or_session_is_invalid() {
        let manager = manager();
        open(&manager, "s1").await;

        let no_type = ClientEnvelope::default().with_session("s1");
        assert!(matches!(
            manager.handle_client_message(no_type, CancellationToken::new()).await,
            Err(SessionError::InvalidMessage(_))
        ));

        let no_session = ClientEnvelope::new("ping").with_session("   ");
        assert!(matches!(
            manager.handle_client_message(no_session, CancellationToken::new()).await,
            Err(SessionError::InvalidMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found_for_every_type() {
        let manager = manager();
        open(&manager, "s1").await;

        for kind in ["ping", "tools.list", "invoke", "bogus"] {
            let envelope = ClientEnvelope::new(kind).with_session("nope");
            let err = manager
                .handle_client_message(envelope, CancellationToken::new())
                .await
                .unwrap_err();
            assert_eq!(err, SessionError::NotFound("nope".to_string()));
        }
    }

    #[tokio::test]
    async fn test_ping_replies_pong_with_correlation() {
        let manager = manager();
        let session = open(&manager, "s1").await;
        let before = session.last_activity();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let envelope = ClientEnvelope::new("ping").with_session("s1").with_request_id("p1");
        manager
            .handle_client_message(envelope, CancellationToken::new())
            .await
            .unwrap();

        let reply = next_message(&session).await;
        assert_eq!(reply.correlation_id.as_deref(), Some("p1"));
        let ServerEvent::Pong(pong) = reply.event else {
            panic!("expected pong");
        };
        assert!(chrono::DateTime::parse_from_rfc3339(&pong.timestamp).is_ok());
        assert!(session.last_activity() > before);
    }

    #[tokio::test]
    async fn test_tools_list_request() {
        let manager = manager();
        let session = open(&manager, "s1").await;
        manager
            .handle_client_message(
                ClientEnvelope::new("tools.list").with_session("s1").with_request_id("t"),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let reply = next_message(&session).await;
        assert_eq!(reply.kind(), "tools.list");
        assert_eq!(reply.correlation_id.as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn test_invoke_ping_tool() {
        let manager = manager();
        let session = open(&manager, "s1").await;

        manager
            .handle_client_message(invoke("s1", "r1", json!({ "name": "ping" })), CancellationToken::new())
            .await
            .unwrap();

        let reply = next_message(&session).await;
        assert_eq!(reply.correlation_id.as_deref(), Some("r1"));
        let ServerEvent::ToolResult(result) = reply.event else {
            panic!("expected tool.result");
        };
        assert_eq!(result.tool, "ping");
        assert_eq!(result.result["pong"], true);
    }

    #[tokio::test]
    async fn test_invoke_without_name_fails_before_lookup() {
        let manager = manager();
        let session = open(&manager, "s1").await;

        let err = manager
            .handle_client_message(
                invoke("s1", "r1", json!({ "arguments": {} })),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidMessage(_)));
        assert_eq!(session.pending(), 0);
    }

    #[tokio::test]
    async fn test_tool_failures_become_error_messages() {
        let manager = manager();
        let session = open(&manager, "s1").await;

        let cases = [
            ("a", json!({ "name": "no_such_tool" }), ErrorCode::ToolNotFound),
            ("b", json!({ "name": "explode" }), ErrorCode::ToolError),
        ];
        for (request_id, payload, code) in cases {
            manager
                .handle_client_message(invoke("s1", request_id, payload), CancellationToken::new())
                .await
                .unwrap();
            let reply = next_message(&session).await;
            assert_eq!(reply.correlation_id.as_deref(), Some(request_id));
            let ServerEvent::Error(error) = reply.event else {
                panic!("expected error");
            };
            assert_eq!(error.code, code);
        }
        assert!(!session.is_completed());
    }

    #[tokio::test]
    async fn test_unknown_type_replies_error_and_keeps_session() {
        let manager = manager();
        let session = open(&manager, "s1").await;
        manager
            .handle_client_message(
                ClientEnvelope::new("subscribe").with_session("s1").with_request_id("u1"),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let reply = next_message(&session).await;
        assert_eq!(reply.correlation_id.as_deref(), Some("u1"));
        assert!(matches!(
            reply.event,
            ServerEvent::Error(ref e) if e.code == ErrorCode::UnknownType
        ));
        assert!(manager.get("s1").is_some());
    }

    #[tokio::test]
    async fn test_concurrent_invokes_each_get_one_reply() {
        let manager = manager();
        let session = open(&manager, "s1").await;

        let mut handles = Vec::new();
        for i in 0..20u64 {
            let manager = manager.clone();
            let payload = if i % 4 == 0 {
                json!({ "name": "no_such_tool" })
            } else {
                json!({ "name": "slow_echo", "arguments": { "delay_ms": (20 - i) * 2 } })
            };
            handles.push(tokio::spawn(async move {
                manager
                    .handle_client_message(invoke("s1", &i.to_string(), payload), CancellationToken::new())
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        manager.complete_session("s1");

        let replies: Vec<ServerMessage> =
            session.read_outbound(CancellationToken::new()).collect().await;
        assert_eq!(replies.len(), 20);
        let ids: HashSet<_> = replies
            .iter()
            .map(|m| m.correlation_id.clone().unwrap())
            .collect();
        assert_eq!(ids.len(), 20);
        assert!(replies
            .iter()
            .all(|m| matches!(m.event, ServerEvent::ToolResult(_) | ServerEvent::Error(_))));
    }

    #[tokio::test]
    async fn test_completion_aborts_in_flight_invocation() {
        let manager = manager();
        let session = open(&manager, "s1").await;

        let task = tokio::spawn({
            let manager = manager.clone();
            async move {
                manager
                    .handle_client_message(
                        invoke("s1", "slow", json!({ "name": "slow_echo", "arguments": { "delay_ms": 60_000 } })),
                        CancellationToken::new(),
                    )
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.complete_session("s1");

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(SessionError::Closed("s1".to_string())));
        assert!(session.is_completed());
    }

    #[tokio::test]
    async fn test_aborted_invocations_are_counted() {
        let counter = Arc::new(UsageCounter::new());
        let registry = ToolRegistry::from_tools([Arc::new(SlowEcho) as Arc<dyn ToolCapability>])
            .unwrap()
            .with_observer(counter.clone());
        let manager = Arc::new(SessionManager::new(Arc::new(registry), SessionOptions::default()));
        let slow = json!({ "name": "slow_echo", "arguments": { "delay_ms": 60_000 } });

        // Caller gives up.
        open(&manager, "a").await;
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let manager = manager.clone();
            let cancel = cancel.clone();
            let envelope = invoke("a", "r1", slow.clone());
            async move { manager.handle_client_message(envelope, cancel).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert_eq!(result, Err(SessionError::Cancelled));

        // Session completes underneath the call.
        open(&manager, "b").await;
        let task = tokio::spawn({
            let manager = manager.clone();
            let envelope = invoke("b", "r2", slow);
            async move { manager.handle_client_message(envelope, CancellationToken::new()).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.complete_session("b");
        let result = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert_eq!(result, Err(SessionError::Closed("b".to_string())));

        let usage = counter.snapshot();
        assert_eq!(usage["slow_echo"].calls, 2);
        assert_eq!(usage["slow_echo"].failures, 2);
    }

    #[tokio::test]
    async fn test_reap_idle_sessions() {
        let registry = Arc::new(ToolRegistry::new());
        let manager = SessionManager::new(
            registry,
            SessionOptions {
                idle_timeout: Some(Duration::from_millis(10)),
                ..Default::default()
            },
        );
        let stale = manager
            .create_session(McpHandshake::default().with_session_id("stale"), TransportKind::EventStream)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        manager
            .create_session(McpHandshake::default().with_session_id("fresh"), TransportKind::EventStream)
            .unwrap();

        assert_eq!(manager.reap_idle(), vec!["stale".to_string()]);
        assert!(stale.is_completed());
        assert!(manager.get("fresh").is_some());
    }

    #[tokio::test]
    async fn test_complete_session_if_spares_reused_id() {
        let manager = manager();
        let old = open(&manager, "s1").await;
        manager.complete_session("s1");
        let fresh = open(&manager, "s1").await;

        assert!(!manager.complete_session_if(&old));
        assert!(!fresh.is_completed());
        assert!(Arc::ptr_eq(&manager.get("s1").unwrap(), &fresh));

        assert!(manager.complete_session_if(&fresh));
        assert!(fresh.is_completed());
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_reap_skips_session_touched_before_sweep() {
        let manager = SessionManager::new(
            Arc::new(ToolRegistry::new()),
            SessionOptions {
                idle_timeout: Some(Duration::from_millis(10)),
                ..Default::default()
            },
        );
        let stale = manager
            .create_session(McpHandshake::default().with_session_id("a"), TransportKind::EventStream)
            .unwrap();
        let touched = manager
            .create_session(McpHandshake::default().with_session_id("b"), TransportKind::EventStream)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        touched.touch();

        assert_eq!(manager.reap_idle(), vec!["a".to_string()]);
        assert!(stale.is_completed());
        assert!(!touched.is_completed());

        // The reaped id is free again and its replacement is not stale.
        let replacement = manager
            .create_session(McpHandshake::default().with_session_id("a"), TransportKind::EventStream)
            .unwrap();
        assert!(manager.reap_idle().is_empty());
        assert!(!replacement.is_completed());
    }

    #[tokio::test]
    async fn test_reaping_disabled() {
        let manager = SessionManager::new(
            Arc::new(ToolRegistry::new()),
            SessionOptions {
                idle_timeout: None,
                ..Default::default()
            },
        );
        manager
            .create_session(McpHandshake::default(), TransportKind::None)
            .unwrap();
        assert!(manager.reap_idle().is_empty());
        assert_eq!(manager.len(), 1);
    }
}
