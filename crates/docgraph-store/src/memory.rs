//! In-memory document store.
//!
//! Keeps collections as insertion-ordered document lists behind an async
//! `RwLock`. Every call is counted so resolution passes can be checked for
//! duplicate fetches, and the store can be switched off to simulate an
//! unreachable backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::entity::{Entity, EntityId, ID_FIELD};
use crate::filter::Filter;
use crate::projection::Projection;
use crate::store::{DocumentStore, EntityUpdate};
use crate::{StoreError, StoreResult};

/// Bookkeeping field holding the store revision of a document.
const REVISION_FIELD: &str = "_rev";

/// Per-collection call counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub gets: HashMap<String, usize>,
    pub finds: HashMap<String, usize>,
}

impl FetchStats {
    /// Number of `get` calls on a collection.
    pub fn gets(&self, collection: &str) -> usize {
        self.gets.get(collection).copied().unwrap_or(0)
    }

    /// Number of `find` calls on a collection.
    pub fn finds(&self, collection: &str) -> usize {
        self.finds.get(collection).copied().unwrap_or(0)
    }

    /// Total reads across all collections.
    pub fn total(&self) -> usize {
        self.gets.values().sum::<usize>() + self.finds.values().sum::<usize>()
    }
}

/// An in-memory [`DocumentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Map<String, Value>>>>,
    revision: AtomicU64,
    unavailable: AtomicBool,
    stats: Mutex<FetchStats>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts raw JSON documents, validating each one. Test and bootstrap helper.
    pub async fn seed(&self, collection: &str, documents: Vec<Value>) -> StoreResult<()> {
        let entities = documents
            .into_iter()
            .map(Entity::from_value)
            .collect::<StoreResult<Vec<_>>>()?;
        self.insert(collection, entities).await
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of the read counters.
    pub fn stats(&self) -> FetchStats {
        self.stats.lock().expect("lock poisoned").clone()
    }

    /// Clears the read counters.
    pub fn reset_stats(&self) {
        *self.stats.lock().expect("lock poisoned") = FetchStats::default();
    }

    /// Current revision of a stored document, if it exists.
    pub async fn revision_of(&self, collection: &str, id: &EntityId) -> Option<u64> {
        let collections = self.collections.read().await;
        collections
            .get(collection)?
            .iter()
            .find(|doc| stored_id(doc) == Some(id.as_str()))?
            .get(REVISION_FIELD)?
            .as_u64()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    fn count_get(&self, collection: &str) {
        let mut stats = self.stats.lock().expect("lock poisoned");
        *stats.gets.entry(collection.to_string()).or_default() += 1;
    }

    fn count_find(&self, collection: &str) {
        let mut stats = self.stats.lock().expect("lock poisoned");
        *stats.finds.entry(collection.to_string()).or_default() += 1;
    }

    fn stamp(&self, mut fields: Map<String, Value>) -> Map<String, Value> {
        let rev = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        fields.insert(REVISION_FIELD.to_string(), Value::from(rev));
        fields
    }
}

fn stored_id(doc: &Map<String, Value>) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

fn load(doc: &Map<String, Value>, projection: &Projection) -> StoreResult<Entity> {
    Entity::from_stored(projection.apply(doc))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(
        &self,
        collection: &str,
        id: &EntityId,
        projection: &Projection,
    ) -> StoreResult<Option<Entity>> {
        self.check_available()?;
        self.count_get(collection);
        trace!(collection, id = %id, "store get");

        let collections = self.collections.read().await;
        collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| stored_id(doc) == Some(id.as_str())))
            .map(|doc| load(doc, projection))
            .transpose()
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &Projection,
    ) -> StoreResult<Vec<Entity>> {
        self.check_available()?;
        self.count_find(collection);
        trace!(collection, conditions = filter.conditions().len(), "store find");

        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for doc in docs {
            let entity = Entity::from_stored(doc.clone())?;
            if filter.matches(&entity) {
                found.push(load(doc, projection)?);
            }
        }
        Ok(found)
    }

    async fn insert(&self, collection: &str, entities: Vec<Entity>) -> StoreResult<()> {
        self.check_available()?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        let mut seen: Vec<&str> = docs.iter().filter_map(stored_id).collect();
        for entity in &entities {
            if seen.contains(&entity.id().as_str()) {
                return Err(StoreError::DuplicateId {
                    collection: collection.to_string(),
                    id: entity.id().to_string(),
                });
            }
            seen.push(entity.id().as_str());
        }

        let count = entities.len();
        let stamped: Vec<_> = entities
            .into_iter()
            .map(|entity| self.stamp(entity.into_map()))
            .collect();
        docs.extend(stamped);
        if docs.is_empty() {
            collections.remove(collection);
        }
        debug!(collection, count, "inserted documents");
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &EntityId,
        update: EntityUpdate,
    ) -> StoreResult<bool> {
        self.check_available()?;
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| stored_id(doc) == Some(id.as_str())))
        else {
            return Ok(false);
        };

        let next = match update {
            EntityUpdate::Replace(entity) => {
                if entity.id() != id {
                    return Err(StoreError::InvalidDocument(format!(
                        "replacement id {} does not match {}",
                        entity.id(),
                        id
                    )));
                }
                entity.into_map()
            }
            EntityUpdate::Patch { set, unset } => {
                let mut fields = doc.clone();
                fields.remove(REVISION_FIELD);
                for name in unset {
                    fields.shift_remove(&name);
                }
                for (name, value) in set {
                    if name != ID_FIELD {
                        fields.insert(name, value);
                    }
                }
                fields
            }
        };
        *doc = self.stamp(next);
        debug!(collection, id = %id, "updated document");
        Ok(true)
    }

    async fn remove(&self, collection: &str, id: &EntityId) -> StoreResult<bool> {
        self.check_available()?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|doc| stored_id(doc) != Some(id.as_str()));
        let removed = docs.len() != before;
        if docs.is_empty() {
            collections.remove(collection);
        }
        if removed {
            debug!(collection, id = %id, "removed document");
        }
        Ok(removed)
    }

    async fn drop_collection(&self, collection: &str) -> StoreResult<bool> {
        self.check_available()?;
        let dropped = self.collections.write().await.remove(collection).is_some();
        if dropped {
            debug!(collection, "dropped collection");
        }
        Ok(dropped)
    }

    async fn collections(&self) -> StoreResult<Vec<String>> {
        self.check_available()?;
        let mut names: Vec<_> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .seed(
                "vm",
                vec![
                    json!({"id": 1, "name": "alpha", "status": "up"}),
                    json!({"id": "2", "name": "beta", "status": "down"}),
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn get_returns_projected_entity_without_internal_fields() {
        let store = seeded().await;
        let vm = store
            .get("vm", &EntityId::from("1"), &Projection::fields(["name"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vm.to_value(), json!({"id": "1", "name": "alpha"}));

        let full = store
            .get("vm", &EntityId::from("1"), &Projection::All)
            .await
            .unwrap()
            .unwrap();
        assert!(full.get(REVISION_FIELD).is_none());
        assert!(store.revision_of("vm", &EntityId::from("1")).await.is_some());
    }

    #[tokio::test]
    async fn find_preserves_insertion_order() {
        let store = seeded().await;
        let all = store.find("vm", &Filter::all(), &Projection::All).await.unwrap();
        let ids: Vec<_> = all.iter().map(|e| e.id().to_string()).collect();
        assert_eq!(ids, vec!["1", "2"]);

        let down = store
            .find("vm", &Filter::all().eq("status", "down"), &Projection::All)
            .await
            .unwrap();
        assert_eq!(down.len(), 1);
        assert_eq!(down[0].id().as_str(), "2");
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected_atomically() {
        let store = seeded().await;
        let err = store
            .seed("vm", vec![json!({"id": "3"}), json!({"id": 1})])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateId {
                collection: "vm".to_string(),
                id: "1".to_string()
            }
        );
        let all = store.find("vm", &Filter::all(), &Projection::All).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn patch_sets_and_unsets_fields() {
        let store = seeded().await;
        let mut set = Map::new();
        set.insert("status".to_string(), json!("paused"));
        let updated = store
            .update(
                "vm",
                &EntityId::from("1"),
                EntityUpdate::Patch {
                    set,
                    unset: vec!["name".to_string()],
                },
            )
            .await
            .unwrap();
        assert!(updated);

        let vm = store
            .get("vm", &EntityId::from("1"), &Projection::All)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vm.to_value(), json!({"id": "1", "status": "paused"}));
    }

    #[tokio::test]
    async fn replace_bumps_revision() {
        let store = seeded().await;
        let id = EntityId::from("2");
        let before = store.revision_of("vm", &id).await.unwrap();
        let replacement = Entity::from_value(json!({"id": "2", "name": "gamma"})).unwrap();
        assert!(store
            .update("vm", &id, EntityUpdate::Replace(replacement))
            .await
            .unwrap());
        assert!(store.revision_of("vm", &id).await.unwrap() > before);
    }

    #[tokio::test]
    async fn update_missing_returns_false() {
        let store = seeded().await;
        let replacement = Entity::from_value(json!({"id": "9"})).unwrap();
        assert!(!store
            .update("vm", &EntityId::from("9"), EntityUpdate::Replace(replacement))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn removing_last_document_drops_collection() {
        let store = seeded().await;
        assert!(store.remove("vm", &EntityId::from("1")).await.unwrap());
        assert!(!store.remove("vm", &EntityId::from("1")).await.unwrap());
        assert!(store.remove("vm", &EntityId::from("2")).await.unwrap());
        assert!(store.collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn collections_are_sorted() {
        let store = seeded().await;
        store.seed("cluster", vec![json!({"id": "c"})]).await.unwrap();
        assert_eq!(store.collections().await.unwrap(), vec!["cluster", "vm"]);
        assert!(store.drop_collection("cluster").await.unwrap());
        assert!(!store.drop_collection("cluster").await.unwrap());
    }

    #[tokio::test]
    async fn counts_reads_per_collection() {
        let store = seeded().await;
        store.get("vm", &EntityId::from("1"), &Projection::All).await.unwrap();
        store.get("vm", &EntityId::from("2"), &Projection::All).await.unwrap();
        store.find("disk", &Filter::all(), &Projection::All).await.unwrap();

        let stats = store.stats();
        assert_eq!(stats.gets("vm"), 2);
        assert_eq!(stats.finds("disk"), 1);
        assert_eq!(stats.total(), 3);

        store.reset_stats();
        assert_eq!(store.stats().total(), 0);
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = seeded().await;
        store.set_unavailable(true);
        let err = store
            .get("vm", &EntityId::from("1"), &Projection::All)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(store.collections().await.is_err());

        store.set_unavailable(false);
        assert!(store.collections().await.is_ok());
    }
}
