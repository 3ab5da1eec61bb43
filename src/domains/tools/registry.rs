//! Tool Registry - central registration and dispatch for all tools.
//!
//! This module provides:
//! - A registry of all available tools, keyed case-insensitively by name
//! - A deterministic, name-sorted descriptor list for clients
//! - Dispatch of tool calls by name
//!
//! The registry is filled once at startup and then shared read-only behind an
//! `Arc`, so lookups need no locking.

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::capability::{ToolArguments, ToolCapability, ToolDescriptor, ToolResult};
use super::error::ToolError;
use super::usage::{InvocationOutcome, UsageObserver};

// ============================================================================
// Tool Registry
// ============================================================================

/// Tool registry - manages all available tools.
#[derive(Default)]
pub struct ToolRegistry {
    /// Key: lowercased tool name.
    tools: HashMap<String, Arc<dyn ToolCapability>>,

    /// Optional usage collector notified after each invocation.
    observer: Option<Arc<dyn UsageObserver>>,
}

impl ToolRegistry {
    /// Create an empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a collection of tools.
    pub fn from_tools<I>(tools: I) -> Result<Self, ToolError>
    where
        I: IntoIterator<Item = Arc<dyn ToolCapability>>,
    {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Attach a usage observer.
    pub fn with_observer(mut self, observer: Arc<dyn UsageObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Register a tool.
    ///
    /// Names are compared case-insensitively; registering a name that is
    /// already present replaces the earlier tool.
    pub fn register(&mut self, tool: Arc<dyn ToolCapability>) -> Result<(), ToolError> {
        let name = tool.name();
        if name.trim().is_empty() {
            return Err(ToolError::InvalidName(name.to_string()));
        }

        let key = name.to_lowercase();
        if self.tools.contains_key(&key) {
            warn!("Replacing previously registered tool: {}", name);
        } else {
            debug!("Registering tool: {}", name);
        }
        self.tools.insert(key, tool);
        Ok(())
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Whether a tool with this name (any case) is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(&name.to_lowercase())
    }

    /// All tool descriptors, sorted case-insensitively by name.
    pub fn describe(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> =
            self.tools.values().map(|tool| tool.descriptor()).collect();
        descriptors.sort_by_cached_key(|d| d.name.to_lowercase());
        descriptors
    }

    /// Invoke a tool by name.
    ///
    /// The tool's result or error is returned unchanged. No retry or timeout
    /// is applied here. Once `cancel` fires the tool is dropped and the call
    /// ends with [`ToolError::Cancelled`], which counts as a failure.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: ToolArguments,
        cancel: CancellationToken,
    ) -> ToolResult {
        let tool = self.tools.get(&name.to_lowercase()).ok_or_else(|| {
            warn!("Unknown tool requested: {}", name);
            ToolError::not_found(name)
        })?;

        info!("Invoking tool: {}", tool.name());
        let result = tokio::select! {
            result = tool.invoke(arguments, cancel.clone()) => result,
            _ = cancel.cancelled() => Err(ToolError::Cancelled),
        };

        if let Some(observer) = &self.observer {
            let outcome = match result {
                Ok(_) => InvocationOutcome::Succeeded,
                Err(_) => InvocationOutcome::Failed,
            };
            observer.record(tool.name(), outcome);
        }

        result
    }
}
