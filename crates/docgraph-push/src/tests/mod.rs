//! Change-notification scenarios: diffs flowing through a publisher.
//!
//! - `minimality.rs` - unchanged documents stay silent, changes name only what changed
//! - `bulk.rs`       - collection replacement ordering and completeness
//! - `delivery.rs`   - sink failures and in-process fan-out

mod delivery;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{ChangePublisher, RecordingSink};

pub(crate) fn recording_publisher() -> (Arc<RecordingSink>, ChangePublisher) {
    let sink = Arc::new(RecordingSink::new());
    (sink.clone(), ChangePublisher::new(sink))
}

pub(crate) fn link_names(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

pub(crate) fn message(topic: &str, payload: &str) -> (String, String) {
    (topic.to_string(), payload.to_string())
}
