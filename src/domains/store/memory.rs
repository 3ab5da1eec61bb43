//! In-memory backing store.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use super::{BackingStore, Entity, ID_FIELD, StoreError, StoreResult};

/// Backing store holding every collection in process memory.
///
/// Only the collections named at construction exist; operations against any
/// other collection fail with [`StoreError::Server`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Entity>>>,
}

impl InMemoryStore {
    /// Create a store with the given (empty) collections.
    pub fn new<I, S>(collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let collections = collections
            .into_iter()
            .map(|name| (name.into(), BTreeMap::new()))
            .collect();
        Self {
            collections: RwLock::new(collections),
        }
    }
}

fn unknown_collection(collection: &str) -> StoreError {
    StoreError::server(format!("unknown collection '{}'", collection))
}

#[async_trait::async_trait]
impl BackingStore for InMemoryStore {
    async fn list(&self, collection: &str) -> StoreResult<Vec<Entity>> {
        let collections = self.collections.read().await;
        let entities = collections
            .get(collection)
            .ok_or_else(|| unknown_collection(collection))?;
        Ok(entities.values().cloned().collect())
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Entity> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .ok_or_else(|| unknown_collection(collection))?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn create(&self, collection: &str, mut entity: Entity) -> StoreResult<Entity> {
        let id = match entity.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };

        let mut collections = self.collections.write().await;
        let entities = collections
            .get_mut(collection)
            .ok_or_else(|| unknown_collection(collection))?;
        if entities.contains_key(&id) {
            return Err(StoreError::conflict(collection, id));
        }

        entity.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        debug!("Created {}/{}", collection, id);
        entities.insert(id, entity.clone());
        Ok(entity)
    }

    async fn update(&self, collection: &str, id: &str, mut entity: Entity) -> StoreResult<Entity> {
        let mut collections = self.collections.write().await;
        let slot = collections
            .get_mut(collection)
            .ok_or_else(|| unknown_collection(collection))?
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        entity.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        *slot = entity.clone();
        debug!("Updated {}/{}", collection, id);
        Ok(entity)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        collections
            .get_mut(collection)
            .ok_or_else(|| unknown_collection(collection))?
            .remove(id)
            .map(|_| debug!("Deleted {}/{}", collection, id))
            .ok_or_else(|| StoreError::not_found(collection, id))
    }
}
