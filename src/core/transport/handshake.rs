//! Handshake extraction from HTTP requests.
//!
//! Connecting clients describe themselves through query parameters:
//!
//! ```text
//! GET /sse?protocolVersion=2025-03-26&clientName=cli&clientVersion=1.0
//!         &sessionId=abc&capabilities={"sampling":{}}
//! ```
//!
//! `Mcp-Session-Id` and `Mcp-Protocol-Version` headers are used when the
//! matching query parameter is absent.

use http::HeaderMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::protocol::McpHandshake;
use crate::core::session::SessionError;

/// Header carrying a requested session id.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Header carrying the requested protocol version.
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Longest session id a client may request.
pub const MAX_SESSION_ID_LEN: usize = 128;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandshakeQuery {
    protocol_version: Option<String>,
    client_name: Option<String>,
    client_version: Option<String>,
    session_id: Option<String>,
    /// JSON object, encoded as a string.
    capabilities: Option<String>,
}

/// Build a handshake from a raw query string and request headers.
pub fn handshake_from_request(
    query: Option<&str>,
    headers: &HeaderMap,
) -> Result<McpHandshake, SessionError> {
    let query: HandshakeQuery = serde_urlencoded::from_str(query.unwrap_or_default())
        .map_err(|e| SessionError::invalid_handshake(format!("unreadable query string: {e}")))?;

    let session_id = match query.session_id {
        Some(id) => Some(id),
        None => header_value(headers, SESSION_ID_HEADER)?,
    };
    let session_id = session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    if let Some(id) = &session_id {
        validate_session_id(id)?;
    }

    let protocol_version = match query.protocol_version {
        Some(version) => version,
        None => header_value(headers, PROTOCOL_VERSION_HEADER)?.unwrap_or_default(),
    };

    let capabilities = query
        .capabilities
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(parse_capabilities)
        .transpose()?;

    Ok(McpHandshake {
        protocol_version,
        client_name: non_empty(query.client_name),
        client_version: non_empty(query.client_version),
        capabilities,
        session_id,
    })
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<Option<String>, SessionError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::to_string)
                .map_err(|_| SessionError::invalid_handshake(format!("header '{name}' is not visible ASCII")))
        })
        .transpose()
}

fn validate_session_id(id: &str) -> Result<(), SessionError> {
    if id.len() > MAX_SESSION_ID_LEN {
        return Err(SessionError::invalid_handshake(format!(
            "session id longer than {MAX_SESSION_ID_LEN} characters"
        )));
    }
    if !id.chars().all(|c| c.is_ascii_graphic()) {
        return Err(SessionError::invalid_handshake(
            "session id may only contain visible ASCII characters",
        ));
    }
    Ok(())
}

fn parse_capabilities(raw: &str) -> Result<Map<String, Value>, SessionError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(capabilities)) => Ok(capabilities),
        Ok(_) => Err(SessionError::invalid_handshake(
            "capabilities must be a JSON object",
        )),
        Err(e) => Err(SessionError::invalid_handshake(format!(
            "capabilities are not valid JSON: {e}"
        ))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
