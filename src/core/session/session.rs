//! Per-connection session state.

use chrono::{DateTime, Utc};
use futures::Stream;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::{SessionError, SessionResult};
use crate::core::protocol::{McpHandshake, ServerEvent, ServerMessage, TransportKind};

/// A live session.
///
/// The outbound queue is an unbounded multi-producer channel with exactly one
/// consumer, the owning transport adapter. Producers never wait on the
/// consumer; `max_pending` (0 = no limit) caps how many undelivered messages
/// may pile up before further sends are refused.
#[derive(Debug)]
pub struct Session {
    id: String,
    handshake: McpHandshake,
    protocol_version: String,
    transport: TransportKind,
    created_at: DateTime<Utc>,
    /// Milliseconds since the Unix epoch.
    last_activity: AtomicI64,

    sender: Mutex<Option<mpsc::UnboundedSender<ServerMessage>>>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerMessage>>,
    pending: AtomicUsize,
    max_pending: usize,

    /// Cancelled when the session completes.
    lifetime: CancellationToken,
}

impl Session {
    pub(crate) fn new(
        id: String,
        handshake: McpHandshake,
        protocol_version: impl Into<String>,
        transport: TransportKind,
        max_pending: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let now = Utc::now();
        Self {
            id,
            handshake,
            protocol_version: protocol_version.into(),
            transport,
            created_at: now,
            last_activity: AtomicI64::new(now.timestamp_millis()),
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            pending: AtomicUsize::new(0),
            max_pending,
            lifetime: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handshake(&self) -> &McpHandshake {
        &self.handshake
    }

    /// Negotiated protocol version.
    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity.load(Ordering::Acquire))
            .unwrap_or(self.created_at)
    }

    /// Number of queued messages not yet read by the transport.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Token cancelled once the session completes.
    pub fn lifetime(&self) -> &CancellationToken {
        &self.lifetime
    }

    pub fn is_completed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Record inbound activity.
    pub fn touch(&self) {
        self.last_activity
            .fetch_max(Utc::now().timestamp_millis(), Ordering::AcqRel);
    }

    /// Queue a message for delivery.
    ///
    /// Fails if the session has completed, the queue is at its depth limit, or
    /// `cancel` has already fired.
    pub async fn send(
        &self,
        event: ServerEvent,
        correlation_id: Option<String>,
        cancel: &CancellationToken,
    ) -> SessionResult<()> {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        self.enqueue(event, correlation_id)
    }

    /// Best-effort enqueue without a cancellation context.
    pub fn try_send(&self, event: ServerEvent, correlation_id: Option<String>) -> bool {
        self.enqueue(event, correlation_id).is_ok()
    }

    fn enqueue(&self, event: ServerEvent, correlation_id: Option<String>) -> SessionResult<()> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = guard
            .as_ref()
            .ok_or_else(|| SessionError::Closed(self.id.clone()))?;

        let depth = self.pending.fetch_add(1, Ordering::AcqRel);
        if self.max_pending > 0 && depth >= self.max_pending {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(SessionError::QueueFull {
                id: self.id.clone(),
                depth,
            });
        }

        let message = ServerMessage {
            session_id: self.id.clone(),
            event,
            correlation_id,
        };
        sender.send(message).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            SessionError::Closed(self.id.clone())
        })
    }

    /// Stream of outbound messages for the session's single consumer.
    ///
    /// Ends when `cancel` fires, or once the session has completed and every
    /// message queued before completion has been yielded. Each call returns a
    /// new stream over the same queue; concurrent streams take turns.
    pub fn read_outbound(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = ServerMessage> + Send + 'static {
        futures::stream::unfold(
            (Arc::clone(self), cancel),
            |(session, cancel)| async move {
                let next = {
                    let mut receiver = session.receiver.lock().await;
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        message = receiver.recv() => message,
                    }
                };
                let message = next?;
                session.pending.fetch_sub(1, Ordering::AcqRel);
                Some((message, (session, cancel)))
            },
        )
    }

    /// Close the outbound queue.
    ///
    /// Later sends fail with [`SessionError::Closed`]; readers drain what is
    /// already queued and then stop. Calling this more than once is harmless.
    pub fn complete(&self, reason: Option<&str>) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            debug!(
                session_id = %self.id,
                reason = reason.unwrap_or("closed"),
                "Session outbound queue closed"
            );
        }
        self.lifetime.cancel();
    }
}
