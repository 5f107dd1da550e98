//! A `DocumentStore` whose reads take simulated time.
//!
//! Tests run it under a paused tokio clock, so every read stays in flight
//! until the runtime has nothing else to do.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docgraph_store::{
    DocumentStore, Entity, EntityId, EntityUpdate, Filter, MemoryStore, Projection, StoreResult,
};
use serde_json::Value;

pub(crate) struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl SlowStore {
    pub(crate) async fn seeded(delay: Duration, fixtures: Vec<(&str, Vec<Value>)>) -> Arc<Self> {
        let inner = MemoryStore::new();
        for (collection, documents) in fixtures {
            inner.seed(collection, documents).await.unwrap();
        }
        inner.reset_stats();
        Arc::new(Self {
            inner,
            delay,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        })
    }

    pub(crate) fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Reads that have begun.
    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Reads that ran to completion.
    pub(crate) fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    async fn delayed<T>(&self, read: impl Future<Output = T>) -> T {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let out = read.await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        out
    }
}

#[async_trait]
impl DocumentStore for SlowStore {
    async fn get(
        &self,
        collection: &str,
        id: &EntityId,
        projection: &Projection,
    ) -> StoreResult<Option<Entity>> {
        self.delayed(self.inner.get(collection, id, projection)).await
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &Projection,
    ) -> StoreResult<Vec<Entity>> {
        self.delayed(self.inner.find(collection, filter, projection)).await
    }

    async fn insert(&self, collection: &str, entities: Vec<Entity>) -> StoreResult<()> {
        self.inner.insert(collection, entities).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &EntityId,
        update: EntityUpdate,
    ) -> StoreResult<bool> {
        self.inner.update(collection, id, update).await
    }

    async fn remove(&self, collection: &str, id: &EntityId) -> StoreResult<bool> {
        self.inner.remove(collection, id).await
    }

    async fn drop_collection(&self, collection: &str) -> StoreResult<bool> {
        self.inner.drop_collection(collection).await
    }

    async fn collections(&self) -> StoreResult<Vec<String>> {
        self.inner.collections().await
    }
}
