//! # Docgraph Query
//!
//! Resolves selector queries over a schemaless document store in one pass.
//!
//! ```text
//! request ─▶ Selector ─▶ QueryPlan ─▶ QueryContext (fetch + cache) ─▶ projection
//! ```
//!
//! References are structural: a field named after another collection links
//! to it. Single references hold one id, explicit multi references an array
//! of ids, and a missing field resolves as the inverse link (every document
//! of the target collection whose field named after the source equals the
//! source's id).
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use docgraph_query::{Permission, QueryConfig, QueryEngine};
//! use docgraph_store::{EntityId, MemoryStore};
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! store.seed("vm", vec![json!({"id": 1, "name": "my vm", "cluster": 2})]).await.unwrap();
//! store.seed("cluster", vec![json!({"id": 2, "name": "my cluster"})]).await.unwrap();
//!
//! let engine = QueryEngine::new(store, QueryConfig::default());
//! let request = engine.parse_request(&json!({"select": ["name", "@cluster.name"]})).unwrap();
//! let vm = engine
//!     .one("vm", &EntityId::from("1"), &request, Arc::new(Permission::Unrestricted))
//!     .await
//!     .unwrap();
//! assert_eq!(vm, Some(json!({"name": "my vm", "@cluster.name": "my cluster"})));
//! # });
//! ```

mod cache;
mod engine;
mod error;
mod order;
mod permission;
mod plan;
mod project;
mod request;
mod resolver;
mod selector;

#[cfg(test)]
mod tests;

pub use cache::SelectorCache;
pub use engine::{QueryConfig, QueryEngine};
pub use error::{QueryError, QueryResult};
pub use order::{OrderBy, SortKey};
pub use permission::{Grant, Permission};
pub use plan::QueryPlan;
pub use request::{parse_where, CollectionScope, QueryRequest};
pub use resolver::{QueryContext, QueryStats};
pub use selector::Selector;
