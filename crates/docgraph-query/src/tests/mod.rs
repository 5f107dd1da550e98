//! Resolution scenarios for the query engine, run against `MemoryStore`.
//!
//! - `select.rs`      - plain field and wildcard projection
//! - `references.rs`  - single, multi and chained references
//! - `collections.rs` - where, orderBy, limit and skip
//! - `permissions.rs` - whitelist scoping and forbidden access
//! - `fetching.rs`    - fetch deduplication, concurrency and store failures
//! - `slow_store.rs`  - a store with delayed reads for in-flight and cancellation cases

mod slow_store;

use std::sync::Arc;

use docgraph_store::{EntityId, MemoryStore};
use serde_json::Value;

use crate::{Permission, QueryConfig, QueryEngine, QueryResult};

/// Seeds a store with `(collection, documents)` fixtures.
pub(crate) async fn setup(
    fixtures: Vec<(&str, Vec<Value>)>,
) -> (Arc<MemoryStore>, QueryEngine) {
    let store = Arc::new(MemoryStore::new());
    for (collection, documents) in fixtures {
        store.seed(collection, documents).await.unwrap();
    }
    store.reset_stats();
    let engine = QueryEngine::new(store.clone(), QueryConfig::default());
    (store, engine)
}

pub(crate) async fn get_one(
    engine: &QueryEngine,
    collection: &str,
    id: &str,
    request: Value,
) -> QueryResult<Option<Value>> {
    get_one_as(engine, collection, id, request, Permission::Unrestricted).await
}

pub(crate) async fn get_one_as(
    engine: &QueryEngine,
    collection: &str,
    id: &str,
    request: Value,
    permission: Permission,
) -> QueryResult<Option<Value>> {
    let request = engine.parse_request(&request)?;
    engine
        .one(collection, &EntityId::from(id), &request, Arc::new(permission))
        .await
}

pub(crate) async fn get_many(
    engine: &QueryEngine,
    collection: &str,
    request: Value,
) -> QueryResult<Vec<Value>> {
    get_many_as(engine, collection, request, Permission::Unrestricted).await
}

pub(crate) async fn get_many_as(
    engine: &QueryEngine,
    collection: &str,
    request: Value,
    permission: Permission,
) -> QueryResult<Vec<Value>> {
    let request = engine.parse_request(&request)?;
    engine.many(collection, &request, Arc::new(permission)).await
}
