//! Tools domain module.
//!
//! This module handles all tool-related functionality. Tools are named,
//! independently invokable capabilities that session clients discover via a
//! descriptor list and call asynchronously.
//!
//! ## Architecture
//!
//! - `capability.rs` - The `ToolCapability` trait every tool implements
//! - `registry.rs` - Case-insensitive tool registry and dispatch
//! - `usage.rs` - Injected usage observer
//! - `definitions/` - Built-in tools (ping, entity CRUD)
//! - `error.rs` - Tool-specific error types
//!
//! ## Adding a New Tool
//!
//! 1. Implement `ToolCapability` for a new type
//! 2. Hand it to `ToolRegistry::register` (or add it to `builtin_tools`)

mod capability;
pub mod definitions;
mod error;
mod registry;
pub mod usage;

pub use capability::{
    ToolArguments, ToolCapability, ToolDescriptor, ToolResult, parse_arguments, schema_for,
};
pub use error::ToolError;
pub use registry::ToolRegistry;
pub use usage::{InvocationOutcome, ToolUsage, UsageCounter, UsageObserver};
