//! Tool capability interface.
//!
//! A tool capability is a named unit of work that clients can invoke through a
//! session. The registry only depends on this trait, so concrete tools (the
//! built-in definitions, or anything supplied by an embedding application) can
//! be registered without the session layer knowing about them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::error::ToolError;

/// Arguments passed to a tool: a JSON object, or nothing at all.
pub type ToolArguments = Option<Map<String, Value>>;

/// Result type for tool invocations.
pub type ToolResult<T = Value> = Result<T, ToolError>;

/// Read-only description of a registered tool, as published to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique (case-insensitive) tool name.
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// JSON schema for the tool's arguments. `None` means the tool accepts
    /// no structured input, or any object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// Trait implemented by every invokable tool.
///
/// Implementations should report domain failures with the matching
/// [`ToolError`] variant (`EntityNotFound`, `InvalidArguments`, `Conflict`,
/// ...) so the session layer can translate them into distinct error codes.
#[async_trait::async_trait]
pub trait ToolCapability: Send + Sync {
    /// Get the name of this tool.
    fn name(&self) -> &str;

    /// Get the description of this tool.
    fn description(&self) -> &str;

    /// Get the JSON schema describing this tool's arguments.
    fn input_schema(&self) -> Option<Value> {
        None
    }

    /// Execute the tool with the given arguments.
    ///
    /// The cancellation token fires when the owning connection goes away.
    /// Long-running tools should watch it; short ones may ignore it.
    async fn invoke(&self, arguments: ToolArguments, cancel: CancellationToken) -> ToolResult;

    /// Build the descriptor published for this tool.
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Deserialize tool arguments into a typed parameter struct.
///
/// Missing arguments are treated as an empty object so that parameter structs
/// with only optional fields still parse.
pub fn parse_arguments<T>(arguments: ToolArguments) -> ToolResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let value = Value::Object(arguments.unwrap_or_default());
    serde_json::from_value(value).map_err(|e| ToolError::invalid_arguments(e.to_string()))
}

/// Generate the JSON schema for a parameter type.
pub fn schema_for<T: schemars::JsonSchema>() -> Value {
    schemars::schema_for!(T).to_value()
}
