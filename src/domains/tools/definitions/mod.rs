//! Tool definitions module.
//!
//! This module exports the built-in tools: a `ping` liveness tool and a
//! family of CRUD tools generated for each backing store collection.

pub mod entities;
pub mod ping;

use std::sync::Arc;

use crate::domains::store::BackingStore;
use crate::domains::tools::ToolCapability;

pub use entities::{EntityOperation, EntityTool, entity_tools};
pub use ping::PingTool;

/// All built-in tools for the given store and collections.
pub fn builtin_tools(
    store: Arc<dyn BackingStore>,
    collections: &[String],
) -> Vec<Arc<dyn ToolCapability>> {
    let mut tools: Vec<Arc<dyn ToolCapability>> = vec![Arc::new(PingTool)];
    for collection in collections {
        tools.extend(entity_tools(store.clone(), collection));
    }
    tools
}
