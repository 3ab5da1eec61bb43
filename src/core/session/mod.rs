//! Sessions and the session manager.
//!
//! A [`Session`] is the per-connection state: identity, handshake, activity
//! timestamps and an ordered outbound queue with a single reader. The
//! [`SessionManager`] owns the table of live sessions and routes inbound
//! client envelopes to the tool registry.

mod error;
mod manager;
#[allow(clippy::module_inception)]
mod session;

pub use error::{SessionError, SessionResult};
pub use manager::{SessionManager, SessionOptions};
pub use session::Session;
