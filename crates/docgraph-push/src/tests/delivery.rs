use std::sync::Arc;

use docgraph_store::EntityId;

use super::{message, recording_publisher};
use crate::{BroadcastSink, ChangePayload, ChangePublisher, CollectionDiff, PublishOutcome};

fn mixed_diff() -> CollectionDiff {
    CollectionDiff {
        created: vec![EntityId::from("a")],
        updated: vec![],
        deleted: vec![EntityId::from("b"), EntityId::from("c")],
    }
}

#[test]
fn failing_sink_does_not_stop_later_notifications() {
    let (sink, publisher) = recording_publisher();

    sink.set_failing(true);
    let failed = publisher.collection("vm", &mixed_diff());
    assert_eq!(failed, PublishOutcome { sent: 0, failed: 3 });

    sink.set_failing(false);
    let sent = publisher.collection("vm", &mixed_diff());
    assert_eq!(sent, PublishOutcome { sent: 3, failed: 0 });
    assert_eq!(
        sink.messages(),
        vec![message("vm/a", "+"), message("vm/b", "-"), message("vm/c", "-")]
    );
}

#[tokio::test]
async fn broadcast_subscribers_see_every_notification_in_order() {
    let sink = Arc::new(BroadcastSink::new(16));
    let mut subscriber = sink.subscribe();
    let publisher = ChangePublisher::new(sink);

    let outcome = publisher.collection("vm", &mixed_diff());
    assert!(outcome.is_clean());

    let first = subscriber.recv().await.unwrap();
    assert_eq!(first.topic(), "vm/a");
    assert_eq!(first.payload, ChangePayload::Created);
    assert_eq!(subscriber.recv().await.unwrap().topic(), "vm/b");
    assert_eq!(subscriber.recv().await.unwrap().topic(), "vm/c");
}

#[test]
fn publishing_without_subscribers_is_not_a_failure() {
    let publisher = ChangePublisher::new(Arc::new(BroadcastSink::new(4)));
    assert!(publisher.created("vm", &EntityId::from("1")).is_clean());
}
