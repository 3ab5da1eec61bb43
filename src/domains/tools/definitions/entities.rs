//! Entity CRUD tool definitions.
//!
//! For every backing store collection five tools are generated:
//! `<collection>_list`, `<collection>_get`, `<collection>_create`,
//! `<collection>_update` and `<collection>_delete`. Each one validates its
//! arguments, forwards to the store and maps store outcomes onto tool errors.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::domains::store::{BackingStore, ID_FIELD, StoreError};
use crate::domains::tools::{
    ToolArguments, ToolCapability, ToolError, ToolResult, parse_arguments, schema_for,
};

// ============================================================================
// Tool Parameters
// ============================================================================

/// Parameters for listing a collection.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct EntityListParams {
    /// Number of entities to skip.
    #[serde(default)]
    pub offset: Option<usize>,

    /// Maximum number of entities to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Parameters addressing a single entity.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EntityIdParams {
    /// Identifier of the entity.
    pub id: String,
}

/// Parameters for creating an entity.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EntityCreateParams {
    /// Identifier for the new entity. Generated when omitted.
    #[serde(default)]
    pub id: Option<String>,

    /// Entity fields.
    pub data: Map<String, Value>,
}

/// Parameters for replacing an entity.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EntityUpdateParams {
    /// Identifier of the entity to replace.
    pub id: String,

    /// New entity fields.
    pub data: Map<String, Value>,
}

// ============================================================================
// Tool Definition
// ============================================================================

/// The CRUD operation an [`EntityTool`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityOperation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl EntityOperation {
    pub const ALL: [EntityOperation; 5] = [
        Self::List,
        Self::Get,
        Self::Create,
        Self::Update,
        Self::Delete,
    ];

    fn suffix(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn describe(self, collection: &str) -> String {
        match self {
            Self::List => format!("List {collection}. Supports offset/limit paging."),
            Self::Get => format!("Fetch one entry of {collection} by id."),
            Self::Create => format!(
                "Create an entry in {collection}. An id is generated when none is given."
            ),
            Self::Update => format!("Replace an existing entry of {collection}."),
            Self::Delete => format!("Delete an entry of {collection} by id."),
        }
    }

    fn schema(self) -> Value {
        match self {
            Self::List => schema_for::<EntityListParams>(),
            Self::Get | Self::Delete => schema_for::<EntityIdParams>(),
            Self::Create => schema_for::<EntityCreateParams>(),
            Self::Update => schema_for::<EntityUpdateParams>(),
        }
    }
}

/// A CRUD tool bound to one collection of the backing store.
pub struct EntityTool {
    name: String,
    description: String,
    collection: String,
    operation: EntityOperation,
    store: Arc<dyn BackingStore>,
}

impl EntityTool {
    /// Create a tool performing `operation` on `collection`.
    pub fn new(
        store: Arc<dyn BackingStore>,
        collection: impl Into<String>,
        operation: EntityOperation,
    ) -> Self {
        let collection = collection.into();
        Self {
            name: format!("{}_{}", collection, operation.suffix()),
            description: operation.describe(&collection),
            collection,
            operation,
            store,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn operation(&self) -> EntityOperation {
        self.operation
    }

    async fn list(&self, params: EntityListParams) -> ToolResult {
        let entities = self.store.list(&self.collection).await?;
        let total = entities.len();
        let items: Vec<Value> = entities
            .into_iter()
            .skip(params.offset.unwrap_or(0))
            .take(params.limit.unwrap_or(usize::MAX))
            .map(Value::Object)
            .collect();

        Ok(json!({
            "collection": self.collection,
            "total": total,
            "items": items
        }))
    }

    async fn get(&self, params: EntityIdParams) -> ToolResult {
        let id = require_id(&params.id)?;
        let entity = self.store.get(&self.collection, id).await?;
        Ok(Value::Object(entity))
    }

    async fn create(&self, params: EntityCreateParams) -> ToolResult {
        let mut data = params.data;
        if let Some(id) = params.id {
            data.insert(ID_FIELD.to_string(), Value::String(require_id(&id)?.to_string()));
        }
        let entity = self.store.create(&self.collection, data).await?;
        info!("Created entity in {}", self.collection);
        Ok(Value::Object(entity))
    }

    async fn update(&self, params: EntityUpdateParams) -> ToolResult {
        let id = require_id(&params.id)?;
        let entity = self.store.update(&self.collection, id, params.data).await?;
        Ok(Value::Object(entity))
    }

    async fn delete(&self, params: EntityIdParams) -> ToolResult {
        let id = require_id(&params.id)?;
        self.store.delete(&self.collection, id).await?;
        Ok(json!({ "id": id, "deleted": true }))
    }
}

fn require_id(id: &str) -> Result<&str, ToolError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ToolError::invalid_arguments("'id' must not be empty"));
    }
    Ok(id)
}

impl From<StoreError> for ToolError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ToolError::entity_not_found(err.to_string()),
            StoreError::Conflict { .. } => ToolError::conflict(err.to_string()),
            StoreError::Server(msg) => ToolError::execution_failed(msg),
        }
    }
}

#[async_trait::async_trait]
impl ToolCapability for EntityTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Option<Value> {
        Some(self.operation.schema())
    }

    #[instrument(skip_all, fields(tool = %self.name))]
    async fn invoke(&self, arguments: ToolArguments, cancel: CancellationToken) -> ToolResult {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        match self.operation {
            EntityOperation::List => self.list(parse_arguments(arguments)?).await,
            EntityOperation::Get => self.get(parse_arguments(arguments)?).await,
            EntityOperation::Create => self.create(parse_arguments(arguments)?).await,
            EntityOperation::Update => self.update(parse_arguments(arguments)?).await,
            EntityOperation::Delete => self.delete(parse_arguments(arguments)?).await,
        }
    }
}

/// The five CRUD tools for one collection.
pub fn entity_tools(store: Arc<dyn BackingStore>, collection: &str) -> Vec<Arc<dyn ToolCapability>> {
    EntityOperation::ALL
        .into_iter()
        .map(|operation| {
            Arc::new(EntityTool::new(store.clone(), collection, operation)) as Arc<dyn ToolCapability>
        })
        .collect()
}
