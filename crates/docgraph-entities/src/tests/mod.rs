//! Entity manager scenarios against `MemoryStore` and a recording sink.
//!
//! - `documents.rs`     - create, replace, patch and remove of single documents
//! - `collections.rs`   - bulk replace and removal of collections
//! - `notifications.rs` - what each write announces
//! - `reads.rs`         - reads through the manager

mod notifications;

use std::sync::Arc;

use docgraph_push::{ChangePublisher, RecordingSink};
use docgraph_query::{Permission, QueryConfig};
use docgraph_store::{EntityId, MemoryStore};
use serde_json::{json, Value};

use crate::EntityManager;

pub(crate) struct Harness {
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
    pub manager: EntityManager,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::new());
        let manager = EntityManager::new(
            store.clone(),
            QueryConfig::default(),
            ChangePublisher::new(sink.clone()),
        );
        Self { store, sink, manager }
    }

    /// Full current version of a document.
    pub async fn read(&self, name: &str, id: &str) -> Option<Value> {
        self.manager
            .get_one(name, &EntityId::from(id), &json!({}), Arc::new(Permission::Unrestricted))
            .await
            .unwrap()
    }

    pub async fn read_all(&self, name: &str) -> Vec<Value> {
        self.manager
            .get_collection(name, &json!({}), Arc::new(Permission::Unrestricted))
            .await
            .unwrap()
    }

    /// Published `(topic, payload)` pairs since the last call.
    pub fn take_messages(&self) -> Vec<(String, String)> {
        let messages = self.sink.messages();
        self.sink.clear();
        messages
    }
}

pub(crate) fn message(topic: &str, payload: &str) -> (String, String) {
    (topic.to_string(), payload.to_string())
}
