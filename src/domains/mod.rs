//! Domains module containing business logic organized by bounded contexts.
//!
//! - **tools**: invokable tool capabilities and their registry
//! - **store**: the CRUD backing store the entity tools proxy into

pub mod store;
pub mod tools;
