//! Backing store domain.
//!
//! The CRUD tools proxy into a [`BackingStore`]: a keyed collection of JSON
//! entities supporting get-all, get-by-id, create, update and delete. The
//! trait is the seam for real storage backends; [`InMemoryStore`] is the
//! implementation used by default and in tests.

mod error;
mod memory;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;

use serde_json::{Map, Value};

/// A stored entity: a JSON object carrying a string `id` field.
pub type Entity = Map<String, Value>;

/// Name of the identifier field inside every entity.
pub const ID_FIELD: &str = "id";

/// CRUD operations over named entity collections.
#[async_trait::async_trait]
pub trait BackingStore: Send + Sync {
    /// List every entity in a collection, ordered by id.
    async fn list(&self, collection: &str) -> StoreResult<Vec<Entity>>;

    /// Fetch one entity by id.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Entity>;

    /// Insert a new entity. The entity's `id` field is used when present,
    /// otherwise the store assigns one. Returns the stored entity.
    async fn create(&self, collection: &str, entity: Entity) -> StoreResult<Entity>;

    /// Replace an existing entity. Returns the stored entity.
    async fn update(&self, collection: &str, id: &str, entity: Entity) -> StoreResult<Entity>;

    /// Remove an entity.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;
}
