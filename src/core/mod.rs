//! Core module containing shared infrastructure components.
//!
//! This module provides the foundational building blocks for the session
//! server: error handling, configuration, the wire protocol, session
//! management, server assembly and the transport adapters.

pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};
pub use server::McpServer;
pub use session::{Session, SessionError, SessionManager};
pub use transport::{HttpTransport, TransportConfig};
