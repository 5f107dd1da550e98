use std::sync::{Arc, Mutex};

use docgraph_push::{ChangePublisher, ChangeSink, Notification, PushResult};
use docgraph_query::QueryConfig;
use docgraph_store::{EntityId, MemoryStore};
use futures_util::FutureExt;
use serde_json::{json, Value};

use super::{message, Harness};
use crate::EntityManager;

/// Notes, for each notification, whether its document was stored when the
/// notification went out.
struct StoredAtPublish {
    store: Arc<MemoryStore>,
    seen: Mutex<Vec<(String, bool)>>,
}

impl ChangeSink for StoredAtPublish {
    fn publish(&self, notification: &Notification) -> PushResult<()> {
        let stored = self
            .store
            .revision_of(&notification.collection, &notification.id)
            .now_or_never()
            .flatten()
            .is_some();
        self.seen
            .lock()
            .expect("lock poisoned")
            .push((notification.topic(), stored));
        Ok(())
    }
}

fn payload() -> Value {
    json!({"id": "push_message_342", "data": "some content"})
}

async fn setup_vms(h: &Harness) -> Vec<Value> {
    let vms: Vec<Value> = (1..=5)
        .map(|i| json!({"id": format!("id_{i}"), "name": format!("name_{i}")}))
        .collect();
    for vm in &vms {
        h.manager.create("vm", vm.clone()).await.unwrap();
    }
    h.take_messages();
    vms
}

#[tokio::test]
async fn creation_is_announced() {
    let h = Harness::new();
    h.manager.create("vm", payload()).await.unwrap();
    assert_eq!(h.take_messages(), vec![message("vm/push_message_342", "+")]);
}

#[tokio::test]
async fn replace_announces_changed_fields() {
    let h = Harness::new();
    h.manager.create("vm", payload()).await.unwrap();
    h.take_messages();

    let id = EntityId::from("push_message_342");
    h.manager
        .replace("vm", &id, json!({"id": "push_message_342", "data": "Some other content"}))
        .await
        .unwrap();
    assert_eq!(h.take_messages(), vec![message("vm/push_message_342", "data")]);
}

#[tokio::test]
async fn unchanged_replace_is_silent() {
    let h = Harness::new();
    h.manager.create("vm", payload()).await.unwrap();
    h.take_messages();

    h.manager
        .replace("vm", &EntityId::from("push_message_342"), payload())
        .await
        .unwrap();
    assert!(h.take_messages().is_empty());
}

#[tokio::test]
async fn nested_changes_are_detected() {
    let h = Harness::new();
    let mut vm = json!({"id": "123", "data": {"head": "foo", "body": [1, 2, 3]}});
    h.manager.create("vm", vm.clone()).await.unwrap();
    h.take_messages();

    h.manager.replace("vm", &EntityId::from("123"), vm.clone()).await.unwrap();
    assert!(h.take_messages().is_empty());

    vm["data"]["body"][2] = json!(42);
    h.manager.replace("vm", &EntityId::from("123"), vm).await.unwrap();
    assert_eq!(h.take_messages(), vec![message("vm/123", "data")]);
}

#[tokio::test]
async fn patch_announces_patched_fields() {
    let h = Harness::new();
    h.manager.create("vm", payload()).await.unwrap();
    h.take_messages();

    h.manager
        .patch(
            "vm",
            &EntityId::from("push_message_342"),
            json!({"data": "new data", "new_field": "surprise"}),
        )
        .await
        .unwrap();
    assert_eq!(
        h.take_messages(),
        vec![message("vm/push_message_342", "data,new_field")]
    );
}

#[tokio::test]
async fn link_change_is_announced_as_link() {
    let h = Harness::new();
    h.manager.create("cluster", json!({"id": "42"})).await.unwrap();
    h.manager.create("vm", payload()).await.unwrap();
    h.take_messages();

    h.manager
        .patch("vm", &EntityId::from("push_message_342"), json!({"cluster": 42}))
        .await
        .unwrap();
    assert_eq!(h.take_messages(), vec![message("vm/push_message_342", "@cluster")]);
}

#[tokio::test]
async fn bulk_update_announces_every_changed_document() {
    let h = Harness::new();
    let mut vms = setup_vms(&h).await;
    for vm in &mut vms {
        vm["status"] = json!("down");
    }

    h.manager.replace_collection("vm", Value::Array(vms)).await.unwrap();
    let expected: Vec<_> = (1..=5).map(|i| message(&format!("vm/id_{i}"), "status")).collect();
    assert_eq!(h.take_messages(), expected);
}

#[tokio::test]
async fn bulk_replace_announces_created_updated_deleted() {
    let h = Harness::new();
    let vms = setup_vms(&h).await;

    let mut next = vec![vms[0].clone(), vms[1].clone(), vms[2].clone()];
    next[0]["status"] = json!("up");
    next[1]["name"] = json!("something");
    next.push(json!({"id": "id_6"}));

    h.manager.replace_collection("vm", Value::Array(next)).await.unwrap();
    assert_eq!(
        h.take_messages(),
        vec![
            message("vm/id_6", "+"),
            message("vm/id_1", "status"),
            message("vm/id_2", "name"),
            message("vm/id_4", "-"),
            message("vm/id_5", "-"),
        ]
    );
}

#[tokio::test]
async fn removal_is_announced() {
    let h = Harness::new();
    h.manager.create("vm", payload()).await.unwrap();
    h.take_messages();

    h.manager.remove("vm", &EntityId::from("push_message_342")).await.unwrap();
    assert_eq!(h.take_messages(), vec![message("vm/push_message_342", "-")]);
}

#[tokio::test]
async fn collection_removal_announces_every_document() {
    let h = Harness::new();
    setup_vms(&h).await;

    h.manager.remove_collection("vm").await.unwrap();
    let expected: Vec<_> = (1..=5).map(|i| message(&format!("vm/id_{i}"), "-")).collect();
    assert_eq!(h.take_messages(), expected);
}

#[tokio::test]
async fn failing_transport_does_not_fail_the_write() {
    let h = Harness::new();
    h.sink.set_failing(true);

    assert!(h.manager.create("vm", payload()).await.unwrap());
    assert!(h.read("vm", "push_message_342").await.is_some());
    assert!(h.take_messages().is_empty());
}

#[tokio::test]
async fn notifications_follow_the_committed_write() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(StoredAtPublish {
        store: store.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let manager = EntityManager::new(
        store.clone(),
        QueryConfig::default(),
        ChangePublisher::new(sink.clone()),
    );

    manager.create("vm", json!({"id": "1"})).await.unwrap();
    manager.create("vm", json!({"id": "2"})).await.unwrap();
    manager.remove("vm", &EntityId::from("1")).await.unwrap();
    manager.remove_collection("vm").await.unwrap();

    assert_eq!(
        *sink.seen.lock().unwrap(),
        vec![
            ("vm/1".to_string(), true),
            ("vm/2".to_string(), true),
            ("vm/1".to_string(), false),
            ("vm/2".to_string(), false),
        ]
    );
}
