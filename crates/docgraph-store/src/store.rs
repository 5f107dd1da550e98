//! The document store seam.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::entity::{Entity, EntityId};
use crate::filter::Filter;
use crate::projection::Projection;
use crate::StoreResult;

/// Change applied to a single stored document.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityUpdate {
    /// Replace the whole document. The replacement keeps the same id.
    Replace(Entity),
    /// Set some fields and remove others, leaving the rest untouched.
    Patch {
        set: Map<String, Value>,
        unset: Vec<String>,
    },
}

/// Schemaless document storage, keyed by collection name and entity id.
///
/// Implementations never return store-internal bookkeeping fields and
/// return documents of a collection in a stable order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load one document.
    async fn get(
        &self,
        collection: &str,
        id: &EntityId,
        projection: &Projection,
    ) -> StoreResult<Option<Entity>>;

    /// Load every document matching the filter, in storage order.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &Projection,
    ) -> StoreResult<Vec<Entity>>;

    /// Insert new documents. Fails without writing anything on an id clash.
    async fn insert(&self, collection: &str, entities: Vec<Entity>) -> StoreResult<()>;

    /// Apply an update. Returns false if the document does not exist.
    async fn update(&self, collection: &str, id: &EntityId, update: EntityUpdate)
        -> StoreResult<bool>;

    /// Delete one document. Returns false if it did not exist.
    async fn remove(&self, collection: &str, id: &EntityId) -> StoreResult<bool>;

    /// Delete a collection and everything in it. Returns false if it did not exist.
    async fn drop_collection(&self, collection: &str) -> StoreResult<bool>;

    /// Names of all non-empty collections, sorted.
    async fn collections(&self) -> StoreResult<Vec<String>>;
}
