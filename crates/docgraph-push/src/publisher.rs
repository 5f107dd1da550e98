//! Best-effort publishing of computed diffs.

use std::ops::AddAssign;
use std::sync::Arc;

use docgraph_config_and_utils::{Config, DEFAULT_PUBLISH_QUEUE_CAPACITY};
use docgraph_store::EntityId;
use tracing::{info, warn};

use crate::diff::{CollectionDiff, ObjectDiff};
use crate::error::PushResult;
use crate::notification::Notification;
use crate::redis_sink::RedisSink;
use crate::sink::{ChangeSink, NullSink};

/// Publisher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Redis endpoint; without one notifications are discarded.
    pub redis_url: Option<String>,
    pub queue_capacity: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            queue_capacity: DEFAULT_PUBLISH_QUEUE_CAPACITY,
        }
    }
}

impl From<&Config> for PublisherConfig {
    fn from(config: &Config) -> Self {
        Self {
            redis_url: config.redis_url.clone(),
            queue_capacity: config.publish_queue_capacity,
        }
    }
}

/// How many notifications of one publish call reached the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    pub sent: usize,
    pub failed: usize,
}

impl PublishOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> usize {
        self.sent + self.failed
    }
}

impl AddAssign for PublishOutcome {
    fn add_assign(&mut self, other: Self) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

/// Turns diffs into notifications and hands them to a sink.
///
/// Sink failures are logged and counted, never returned: the write being
/// announced has already been committed.
#[derive(Clone)]
pub struct ChangePublisher {
    sink: Arc<dyn ChangeSink>,
}

impl ChangePublisher {
    pub fn new(sink: Arc<dyn ChangeSink>) -> Self {
        Self { sink }
    }

    /// A publisher that discards everything.
    pub fn null() -> Self {
        Self::new(Arc::new(NullSink))
    }

    /// Connects the configured transport.
    pub async fn from_config(config: &PublisherConfig) -> PushResult<Self> {
        match &config.redis_url {
            Some(url) => {
                let sink = RedisSink::connect(url, config.queue_capacity).await?;
                Ok(Self::new(Arc::new(sink)))
            }
            None => {
                info!("No change transport configured; notifications are discarded");
                Ok(Self::null())
            }
        }
    }

    pub fn created(&self, collection: &str, id: &EntityId) -> PublishOutcome {
        self.send(Notification::created(collection, id.clone()))
    }

    pub fn deleted(&self, collection: &str, id: &EntityId) -> PublishOutcome {
        self.send(Notification::deleted(collection, id.clone()))
    }

    /// Announces an update; an empty diff publishes nothing.
    pub fn updated(&self, collection: &str, id: &EntityId, diff: &ObjectDiff) -> PublishOutcome {
        match Notification::updated(collection, id.clone(), diff) {
            Some(notification) => self.send(notification),
            None => PublishOutcome::default(),
        }
    }

    /// Announces a collection diff: created, then updated, then deleted.
    pub fn collection(&self, collection: &str, diff: &CollectionDiff) -> PublishOutcome {
        let mut outcome = PublishOutcome::default();
        for id in &diff.created {
            outcome += self.created(collection, id);
        }
        for updated in &diff.updated {
            outcome += self.updated(collection, &updated.id, &updated.diff);
        }
        for id in &diff.deleted {
            outcome += self.deleted(collection, id);
        }
        outcome
    }

    /// Announces the removal of every listed id.
    pub fn deleted_all<'a>(
        &self,
        collection: &str,
        ids: impl IntoIterator<Item = &'a EntityId>,
    ) -> PublishOutcome {
        let mut outcome = PublishOutcome::default();
        for id in ids {
            outcome += self.deleted(collection, id);
        }
        outcome
    }

    fn send(&self, notification: Notification) -> PublishOutcome {
        match self.sink.publish(&notification) {
            Ok(()) => {
                info!(
                    topic = %notification.topic(),
                    payload = %notification.payload(),
                    "Change published"
                );
                PublishOutcome { sent: 1, failed: 0 }
            }
            Err(err) => {
                warn!(topic = %notification.topic(), error = %err, "Change notification dropped");
                PublishOutcome { sent: 0, failed: 1 }
            }
        }
    }
}
