//! Transport layer for the session server.
//!
//! Three adapters share one HTTP listener:
//! - **Event stream** (`GET /sse`): push-only, server-sent events - feature: `sse`
//! - **WebSocket** (`GET /ws`): full duplex - feature: `websocket`
//! - **Stateless POST** (`POST /message`): one client envelope per request
//!
//! Adapters only frame bytes; protocol semantics live in the session manager.
//! A push adapter owns its session for the lifetime of its connection.
//!
//! # Feature Flags
//!
//! - `sse` (default): event-stream adapter
//! - `websocket` (default): WebSocket adapter - adds axum's `ws` support

mod config;
#[cfg(any(feature = "sse", feature = "websocket"))]
mod connection;
mod error;
mod handshake;
pub mod http;
mod post;

#[cfg(feature = "sse")]
mod sse;

#[cfg(feature = "websocket")]
mod websocket;

pub use config::TransportConfig;
pub use error::{TransportError, TransportResult, error_response};
pub use handshake::{
    MAX_SESSION_ID_LEN, PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER, handshake_from_request,
};
pub use http::HttpTransport;
