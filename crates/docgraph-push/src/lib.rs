//! # Docgraph Push
//!
//! Decides exactly what a write changed and announces it.
//!
//! ```text
//! prior version ─┐
//!                ├─▶ object_diff / collection_diff ─▶ ChangePublisher ─▶ ChangeSink
//! new version  ──┘
//! ```
//!
//! Every affected document gets one message on topic `<collection>/<id>`:
//! `+` when created, `-` when deleted, or the comma-separated changed names
//! (links as `@name`) when updated. Unchanged documents get nothing.
//!
//! Publishing happens after the write has been committed and is
//! best-effort; a failing transport never fails the write.

mod diff;
mod error;
mod notification;
mod publisher;
mod redis_sink;
mod sink;

#[cfg(test)]
mod tests;

pub use diff::{collection_diff, object_diff, patch_diff, CollectionDiff, ObjectDiff, UpdatedEntity};
pub use error::{PushError, PushResult};
pub use notification::{ChangePayload, Notification};
pub use publisher::{ChangePublisher, PublishOutcome, PublisherConfig};
pub use redis_sink::RedisSink;
pub use sink::{BroadcastSink, ChangeSink, NullSink, RecordingSink};
