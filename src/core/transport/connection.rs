//! Connection-scoped session ownership.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::session::{Session, SessionManager};

/// Ties a session to the lifetime of one push connection.
///
/// Dropping the guard cancels the connection scope and completes the session,
/// whichever way the connection ended. Completion is by identity: if the
/// session was already completed and its id reused, the newer session is left
/// alone. The scope token is independent of the session's own lifetime so
/// that messages queued before completion still drain to the client.
pub(crate) struct ConnectionGuard {
    sessions: Arc<SessionManager>,
    session: Arc<Session>,
    scope: CancellationToken,
}

impl ConnectionGuard {
    pub(crate) fn new(sessions: Arc<SessionManager>, session: Arc<Session>) -> Self {
        Self {
            sessions,
            session,
            scope: CancellationToken::new(),
        }
    }

    pub(crate) fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub(crate) fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Cancelled when the connection ends.
    pub(crate) fn scope(&self) -> &CancellationToken {
        &self.scope
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.scope.cancel();
        debug!("Connection for session {} closed", self.session.id());
        self.sessions.complete_session_if(&self.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::{McpHandshake, TransportKind};
    use crate::core::session::SessionOptions;
    use crate::domains::tools::ToolRegistry;

    fn sessions() -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            Arc::new(ToolRegistry::new()),
            SessionOptions::default(),
        ))
    }

    fn create(sessions: &SessionManager, id: &str) -> Arc<Session> {
        sessions
            .create_session(
                McpHandshake::default().with_session_id(id),
                TransportKind::EventStream,
            )
            .unwrap()
    }

    #[test]
    fn test_drop_completes_session() {
        let sessions = sessions();
        let session = create(&sessions, "s1");

        let guard = ConnectionGuard::new(sessions.clone(), session.clone());
        let scope = guard.scope().clone();
        assert!(!scope.is_cancelled());

        drop(guard);
        assert!(scope.is_cancelled());
        assert!(session.is_completed());
        assert!(sessions.get("s1").is_none());
    }

    #[test]
    fn test_stale_guard_leaves_reused_id_alone() {
        let sessions = sessions();
        let old = create(&sessions, "s1");
        let guard = ConnectionGuard::new(sessions.clone(), old.clone());

        // Reaped while the old connection is still draining, then reconnected.
        sessions.complete_session("s1");
        let fresh = create(&sessions, "s1");

        drop(guard);
        assert!(old.is_completed());
        assert!(!fresh.is_completed());
        assert!(Arc::ptr_eq(&sessions.get("s1").unwrap(), &fresh));
    }
}
