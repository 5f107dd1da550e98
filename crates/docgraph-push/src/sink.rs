//! Transports that receive change notifications.
//!
//! Sinks are called after the write they describe has been committed. A
//! sink may fail, but the failure never reaches the writer: the publisher
//! logs and counts it.

use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::trace;

use crate::error::{PushError, PushResult};
use crate::notification::Notification;

/// A transport for change notifications.
pub trait ChangeSink: Send + Sync {
    /// Hands one notification to the transport without blocking.
    fn publish(&self, notification: &Notification) -> PushResult<()>;
}

/// A sink that discards every notification.
#[derive(Debug, Default)]
pub struct NullSink;

impl ChangeSink for NullSink {
    fn publish(&self, _notification: &Notification) -> PushResult<()> {
        Ok(())
    }
}

/// A sink that records notifications for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
    failing: Mutex<bool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail without recording.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().expect("lock poisoned") = failing;
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().expect("lock poisoned").clone()
    }

    /// Recorded `(topic, payload)` pairs in publish order.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.notifications
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|n| (n.topic(), n.payload()))
            .collect()
    }

    pub fn clear(&self) {
        self.notifications.lock().expect("lock poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.notifications.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChangeSink for RecordingSink {
    fn publish(&self, notification: &Notification) -> PushResult<()> {
        if *self.failing.lock().expect("lock poisoned") {
            return Err(PushError::publish_failed(notification.topic(), "sink is failing"));
        }
        self.notifications
            .lock()
            .expect("lock poisoned")
            .push(notification.clone());
        Ok(())
    }
}

/// Fans notifications out to in-process subscribers.
///
/// Subscribers that fall behind by more than the channel capacity miss the
/// oldest notifications. Publishing with no subscriber is not a failure.
pub struct BroadcastSink {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl ChangeSink for BroadcastSink {
    fn publish(&self, notification: &Notification) -> PushResult<()> {
        if self.sender.send(notification.clone()).is_err() {
            trace!(topic = %notification.topic(), "no subscribers");
        }
        Ok(())
    }
}
