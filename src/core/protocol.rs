//! Wire protocol types.
//!
//! Clients send [`ClientEnvelope`]s and receive [`ServerMessage`]s. Both are
//! transport-agnostic JSON objects keyed by a string `type`:
//!
//! ```text
//! client → server: {"sessionId"?, "type", "requestId"?, "payload"?}
//! server → client: {"sessionId", "type", "payload", "requestId"?}
//! ```
//!
//! Inbound `type`s are decoded into the closed [`ClientRequest`] union with an
//! explicit [`ClientRequest::Unknown`] fallback, and outbound messages are
//! built from the closed [`ServerEvent`] union.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::session::SessionError;
use crate::domains::tools::{ToolArguments, ToolDescriptor, ToolError};

/// Protocol versions this server can speak, oldest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26"];

/// The version negotiated when a client asks for none or an unknown one.
pub const LATEST_PROTOCOL_VERSION: &str = "2025-03-26";

/// Pick the protocol version for a session.
pub fn negotiate_protocol_version(requested: &str) -> &'static str {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .find(|v| **v == requested.trim())
        .copied()
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

// ============================================================================
// Handshake
// ============================================================================

/// Which adapter owns a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    #[serde(rename = "sse")]
    EventStream,
    #[serde(rename = "websocket")]
    WebSocket,
    #[serde(rename = "none")]
    None,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EventStream => "sse",
            Self::WebSocket => "websocket",
            Self::None => "none",
        })
    }
}

/// Session parameters presented by a connecting client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpHandshake {
    /// Requested protocol version (may be empty).
    #[serde(default)]
    pub protocol_version: String,

    #[serde(default)]
    pub client_name: Option<String>,

    #[serde(default)]
    pub client_version: Option<String>,

    /// Client-declared capabilities.
    #[serde(default)]
    pub capabilities: Option<Map<String, Value>>,

    /// Session id requested by the client. A fresh id is generated when absent.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl McpHandshake {
    /// Handshake with only a protocol version.
    pub fn new(protocol_version: impl Into<String>) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            ..Default::default()
        }
    }

    /// Request a specific session id.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// The requested session id, trimmed, if one was given.
    pub fn requested_session_id(&self) -> Option<&str> {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

// ============================================================================
// Client → Server
// ============================================================================

/// Inbound message as decoded from the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientEnvelope {
    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    /// Opaque correlation id; numbers are accepted and kept as text.
    #[serde(default, deserialize_with = "deserialize_request_id")]
    pub request_id: Option<String>,

    #[serde(default)]
    pub payload: Option<Value>,
}

impl ClientEnvelope {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

fn deserialize_request_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    }))
}

/// Well-known client message types.
pub mod client_types {
    pub const PING: &str = "ping";
    pub const TOOLS_LIST: &str = "tools.list";
    pub const INVOKE: &str = "invoke";
}

/// Payload of an `invoke` request.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeRequest {
    pub name: String,
    pub arguments: ToolArguments,
}

impl InvokeRequest {
    /// Validate an `invoke` payload.
    pub fn from_payload(payload: Option<Value>) -> Result<Self, SessionError> {
        let mut object = match payload {
            Some(Value::Object(object)) => object,
            Some(_) => {
                return Err(SessionError::invalid_message(
                    "invoke payload must be a JSON object",
                ));
            }
            None => {
                return Err(SessionError::invalid_message(
                    "invoke payload is missing the 'name' field",
                ));
            }
        };

        let name = match object.remove("name") {
            Some(Value::String(name)) => name,
            Some(_) => {
                return Err(SessionError::invalid_message(
                    "invoke payload field 'name' must be a string",
                ));
            }
            None => {
                return Err(SessionError::invalid_message(
                    "invoke payload is missing the 'name' field",
                ));
            }
        };
        if name.trim().is_empty() {
            return Err(SessionError::invalid_message(
                "invoke payload field 'name' must not be empty",
            ));
        }

        let arguments = match object.remove("arguments") {
            None | Some(Value::Null) => None,
            Some(Value::Object(arguments)) => Some(arguments),
            Some(_) => {
                return Err(SessionError::invalid_message(
                    "invoke payload field 'arguments' must be an object",
                ));
            }
        };

        Ok(Self {
            name: name.trim().to_string(),
            arguments,
        })
    }
}

/// Decoded client request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    Ping,
    ToolsList,
    Invoke(InvokeRequest),
    /// Any `type` this server does not recognize.
    Unknown(String),
}

impl ClientRequest {
    /// Decode a request from its `type` and payload.
    pub fn parse(kind: &str, payload: Option<Value>) -> Result<Self, SessionError> {
        Ok(match kind {
            client_types::PING => Self::Ping,
            client_types::TOOLS_LIST => Self::ToolsList,
            client_types::INVOKE => Self::Invoke(InvokeRequest::from_payload(payload)?),
            other => Self::Unknown(other.to_string()),
        })
    }
}

// ============================================================================
// Server → Client
// ============================================================================

/// Machine-readable error codes carried by `error` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ToolNotFound,
    ToolError,
    InvalidRequest,
    UnknownType,
    SessionNotFound,
    NotFound,
    Conflict,
    Cancelled,
    InternalError,
}

impl From<&ToolError> for ErrorCode {
    fn from(err: &ToolError) -> Self {
        match err {
            ToolError::NotFound(_) => Self::ToolNotFound,
            ToolError::InvalidArguments(_) => Self::InvalidRequest,
            ToolError::EntityNotFound(_) => Self::NotFound,
            ToolError::Conflict(_) => Self::Conflict,
            ToolError::Cancelled => Self::Cancelled,
            ToolError::InvalidName(_) | ToolError::ExecutionFailed(_) => Self::ToolError,
        }
    }
}

impl From<&SessionError> for ErrorCode {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::NotFound(_) => Self::SessionNotFound,
            SessionError::InvalidMessage(_) | SessionError::InvalidHandshake(_) => {
                Self::InvalidRequest
            }
            SessionError::Cancelled => Self::Cancelled,
            SessionError::Conflict(_)
            | SessionError::Closed(_)
            | SessionError::QueueFull { .. } => Self::InternalError,
        }
    }
}

/// Server identification included in `session.created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Payload of `session.created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: String,
    pub transport: TransportKind,
    pub protocol_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Map<String, Value>>,
    pub server: ServerInfo,
}

/// Payload of `tools.list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsList {
    pub tools: Vec<ToolDescriptor>,
}

/// Payload of `pong`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    /// ISO-8601 UTC timestamp.
    pub timestamp: String,
}

impl Pong {
    pub fn now() -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

/// Payload of `tool.result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPayload {
    pub tool: String,
    pub result: Value,
}

/// Payload of `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Every outbound message kind, serialized as `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated(SessionCreated),
    #[serde(rename = "tools.list")]
    ToolsList(ToolsList),
    #[serde(rename = "pong")]
    Pong(Pong),
    #[serde(rename = "tool.result")]
    ToolResult(ToolResultPayload),
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

impl ServerEvent {
    /// The wire `type` of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionCreated(_) => "session.created",
            Self::ToolsList(_) => "tools.list",
            Self::Pong(_) => "pong",
            Self::ToolResult(_) => "tool.result",
            Self::Error(_) => "error",
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload::new(code, message))
    }
}

/// Outbound message attributed to a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub session_id: String,

    #[serde(flatten)]
    pub event: ServerEvent,

    /// Echo of the triggering envelope's `requestId`; absent for pushes.
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        self.event.kind()
    }
}
