//! Read and write orchestration over the query engine, the store and the
//! change publisher.
//!
//! Every write loads the prior version with full data and no permission
//! restriction, computes the diff, applies the write, and only then
//! publishes. Writes on one collection are serialized by a per-collection
//! lock; reads take no lock.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use docgraph_push::{collection_diff, object_diff, patch_diff, ChangePublisher};
use docgraph_query::{Permission, QueryConfig, QueryEngine};
use docgraph_store::{DocumentStore, Entity, EntityId, EntityUpdate, Filter, Projection, ID_FIELD};
use serde_json::{Map, Value};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::check;
use crate::error::{EntityError, EntityResult};

/// Entry point for document reads and writes.
pub struct EntityManager {
    store: Arc<dyn DocumentStore>,
    query: QueryEngine,
    publisher: ChangePublisher,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl EntityManager {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        config: QueryConfig,
        publisher: ChangePublisher,
    ) -> Self {
        let query = QueryEngine::new(Arc::clone(&store), config);
        Self {
            store,
            query,
            publisher,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn query(&self) -> &QueryEngine {
        &self.query
    }

    pub fn publisher(&self) -> &ChangePublisher {
        &self.publisher
    }

    /// Resolves one document for `request` (`{select, ...}`).
    pub async fn get_one(
        &self,
        name: &str,
        id: &EntityId,
        request: &Value,
        permission: Arc<Permission>,
    ) -> EntityResult<Option<Value>> {
        let request = self.query.parse_request(request)?;
        Ok(self.query.one(name, id, &request, permission).await?)
    }

    /// Resolves a collection for `request` (`{select, where, orderBy, limit, skip}`).
    pub async fn get_collection(
        &self,
        name: &str,
        request: &Value,
        permission: Arc<Permission>,
    ) -> EntityResult<Vec<Value>> {
        let request = self.query.parse_request(request)?;
        Ok(self.query.many(name, &request, permission).await?)
    }

    /// Stores a new document. An existing id is replaced instead.
    ///
    /// Returns whether the document was newly created.
    pub async fn create(&self, name: &str, data: Value) -> EntityResult<bool> {
        let entity = check::document(data)?;
        let _guard = self.lock(name).await;
        self.write_document(name, entity).await
    }

    /// Replaces the document at `id`, creating it if missing.
    ///
    /// Returns whether the document was newly created.
    pub async fn replace(&self, name: &str, id: &EntityId, data: Value) -> EntityResult<bool> {
        let entity = check::document(data)?;
        if entity.id() != id {
            return Err(EntityError::bad_request(
                "Document id must match last segment of document URL.",
            ));
        }
        let _guard = self.lock(name).await;
        self.write_document(name, entity).await
    }

    /// Sets the given fields of an existing document; `null` unsets a field.
    pub async fn patch(&self, name: &str, id: &EntityId, data: Value) -> EntityResult<()> {
        let data = check::payload(data)?;
        if let Some(raw) = data.get(ID_FIELD) {
            if EntityId::from_value(raw).as_ref() != Some(id) {
                return Err(EntityError::bad_request("Document id cannot be patched."));
            }
        }
        if data.is_empty() {
            return Ok(());
        }

        let _guard = self.lock(name).await;
        let existing = self
            .query
            .load_full(name, id)
            .await?
            .ok_or_else(|| EntityError::not_found("Cannot patch non-existing document."))?;

        let diff = patch_diff(existing.fields(), &data, &self.link_names().await?);
        let (set, unset) = split_patch(data);
        self.store
            .update(name, id, EntityUpdate::Patch { set, unset })
            .await?;
        debug!(collection = name, id = %id, changed = ?diff.changed_names(), "Document patched");

        self.publisher.updated(name, id, &diff);
        Ok(())
    }

    /// Replaces a whole collection. An empty list removes it.
    ///
    /// Returns whether the collection was newly created.
    pub async fn replace_collection(&self, name: &str, data: Value) -> EntityResult<bool> {
        let entities = check::array(data)?
            .into_iter()
            .map(check::document)
            .collect::<EntityResult<Vec<_>>>()?;
        check::unique_ids(&entities)?;

        let _guard = self.lock(name).await;
        if entities.is_empty() {
            self.remove_all(name).await?;
            return Ok(false);
        }

        let existing = self.query.load_collection(name).await?;
        let created = existing.is_empty();
        let diff = collection_diff(&existing, &entities, &self.link_names().await?);

        self.store.drop_collection(name).await?;
        self.store.insert(name, entities).await?;
        info!(
            collection = name,
            created = diff.created.len(),
            updated = diff.updated.len(),
            deleted = diff.deleted.len(),
            "Collection replaced"
        );

        self.publisher.collection(name, &diff);
        Ok(created)
    }

    /// Removes one document.
    pub async fn remove(&self, name: &str, id: &EntityId) -> EntityResult<()> {
        let _guard = self.lock(name).await;
        if !self.store.remove(name, id).await? {
            return Err(EntityError::not_found("Cannot delete non-existing document."));
        }
        info!(collection = name, id = %id, "Document removed");

        self.publisher.deleted(name, id);
        Ok(())
    }

    /// Removes every document of a collection.
    pub async fn remove_collection(&self, name: &str) -> EntityResult<()> {
        let _guard = self.lock(name).await;
        self.remove_all(name).await
    }

    async fn remove_all(&self, name: &str) -> EntityResult<()> {
        let existing = self
            .store
            .find(name, &Filter::all(), &Projection::fields([ID_FIELD]))
            .await?;
        self.store.drop_collection(name).await?;
        info!(collection = name, count = existing.len(), "Collection removed");

        self.publisher.deleted_all(name, existing.iter().map(Entity::id));
        Ok(())
    }

    /// Inserts or replaces one validated document under the collection lock.
    async fn write_document(&self, name: &str, entity: Entity) -> EntityResult<bool> {
        let id = entity.id().clone();
        let Some(existing) = self.query.load_full(name, &id).await? else {
            self.store.insert(name, vec![entity]).await?;
            info!(collection = name, id = %id, "Document created");
            self.publisher.created(name, &id);
            return Ok(true);
        };

        let diff = object_diff(existing.fields(), entity.fields(), &self.link_names().await?);
        self.store
            .update(name, &id, EntityUpdate::Replace(entity))
            .await?;
        debug!(collection = name, id = %id, changed = ?diff.changed_names(), "Document replaced");

        self.publisher.updated(name, &id, &diff);
        Ok(false)
    }

    /// Collections currently known to the store; fields named after them are links.
    async fn link_names(&self) -> EntityResult<BTreeSet<String>> {
        Ok(self.store.collections().await?.into_iter().collect())
    }

    async fn lock(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("lock poisoned");
            Arc::clone(locks.entry(name.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Splits patch data into fields to set and fields to unset.
fn split_patch(data: Map<String, Value>) -> (Map<String, Value>, Vec<String>) {
    let mut set = Map::new();
    let mut unset = Vec::new();
    for (name, value) in data {
        if name == ID_FIELD {
            continue;
        }
        if value.is_null() {
            unset.push(name);
        } else {
            set.insert(name, value);
        }
    }
    (set, unset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_patch_separates_unsets_and_drops_id() {
        let data = json!({"id": "1", "a": 1, "b": null, "c": {"x": null}});
        let (set, unset) = split_patch(data.as_object().cloned().unwrap());
        assert_eq!(Value::Object(set), json!({"a": 1, "c": {"x": null}}));
        assert_eq!(unset, vec!["b"]);
    }
}
