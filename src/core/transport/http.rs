//! HTTP transport implementation.
//!
//! A single axum listener hosts every adapter: the event stream (GET), the
//! WebSocket upgrade (GET) and the stateless message endpoint (POST), plus
//! a few informational routes.

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{TransportConfig, TransportError, TransportResult, post::handle_message};
use crate::core::McpServer;

/// HTTP transport handler.
pub struct HttpTransport {
    config: TransportConfig,
}

/// Application state shared across HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub(crate) server: McpServer,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given config.
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Get the bind address.
    pub fn address(&self) -> String {
        self.config.address()
    }

    /// Build the router serving every enabled adapter.
    pub fn router(&self, server: McpServer) -> Router {
        let state = AppState { server };

        let mut app = Router::new()
            .route(&self.config.message_path, post(handle_message))
            .route("/health", get(health_check))
            .route("/stats", get(stats_handler))
            .route("/", get(root_handler));

        #[cfg(feature = "sse")]
        {
            app = app.route(&self.config.sse_path, get(super::sse::handle_sse));
        }

        #[cfg(feature = "websocket")]
        {
            app = app.route(&self.config.ws_path, get(super::websocket::handle_upgrade));
        }

        let mut app = app
            .with_state(state)
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any);
            app = app.layer(cors);
        }

        app
    }

    /// Serve until `shutdown` fires.
    ///
    /// On shutdown every live session is completed so that push connections
    /// drain and close before the listener stops.
    pub async fn run(self, server: McpServer, shutdown: CancellationToken) -> TransportResult<()> {
        let addr = self.address();
        let app = self.router(server.clone());

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::bind(&addr, e))?;

        let cors_status = if self.config.enable_cors {
            "enabled"
        } else {
            "disabled"
        };
        info!("Ready - listening on {} (CORS {})", addr, cors_status);
        #[cfg(feature = "sse")]
        info!("  → Events:   GET  {}", self.config.sse_path);
        #[cfg(feature = "websocket")]
        info!("  → Socket:   GET  {}", self.config.ws_path);
        info!("  → Messages: POST {}", self.config.message_path);
        info!("  → Health:   GET  /health");

        let sessions = server.sessions().clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("Shutting down, closing {} session(s)", sessions.len());
                sessions.complete_all();
            })
            .await
            .map_err(|e| TransportError::http(e.to_string()))?;

        Ok(())
    }
}

/// Root handler - provides API info.
async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    let transport = &state.server.config().transport;
    Json(json!({
        "name": state.server.name(),
        "version": state.server.version(),
        "transports": enabled_transports(),
        "endpoints": {
            "events": transport.sse_path,
            "socket": transport.ws_path,
            "messages": transport.message_path,
            "health": "/health",
            "stats": "/stats"
        },
        "documentation": "Open an event stream or WebSocket to get a session, then send messages to it"
    }))
}

fn enabled_transports() -> Vec<&'static str> {
    let mut transports = Vec::new();
    #[cfg(feature = "sse")]
    transports.push("sse");
    #[cfg(feature = "websocket")]
    transports.push("websocket");
    transports.push("post");
    transports
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Live session count and per-tool usage.
async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "sessions": state.server.sessions().len(),
        "tools": state.server.usage().snapshot()
    }))
}
