//! Redis pub/sub transport.
//!
//! `publish` only enqueues; a spawned worker drains the queue and issues
//! `PUBLISH <collection>/<id> <payload>` in enqueue order. A full queue
//! fails the publish instead of blocking the writer.

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisResult};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{PushError, PushResult};
use crate::notification::Notification;
use crate::sink::ChangeSink;

/// A [`ChangeSink`] backed by a Redis connection.
pub struct RedisSink {
    sender: mpsc::Sender<Notification>,
    worker: JoinHandle<()>,
}

impl RedisSink {
    /// Connects to `redis_url` and starts the publish worker.
    ///
    /// Must be called inside a Tokio runtime.
    pub async fn connect(redis_url: &str, queue_capacity: usize) -> PushResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!(queue_capacity, "Connected change publisher to Redis");

        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let worker = tokio::spawn(publish_worker(conn, receiver));
        Ok(Self { sender, worker })
    }

    /// Notifications waiting for the worker.
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Stops accepting notifications and waits until the queue is drained.
    pub async fn close(self) {
        drop(self.sender);
        if let Err(err) = self.worker.await {
            warn!(error = %err, "Redis publish worker ended abnormally");
        }
    }
}

async fn publish_worker(
    mut conn: MultiplexedConnection,
    mut receiver: mpsc::Receiver<Notification>,
) {
    while let Some(notification) = receiver.recv().await {
        let topic = notification.topic();
        let payload = notification.payload();
        let result: RedisResult<i64> = conn.publish(&topic, &payload).await;
        match result {
            Ok(receivers) => {
                debug!(topic = %topic, payload = %payload, receivers, "Published change")
            }
            Err(err) => warn!(topic = %topic, error = %err, "Redis PUBLISH failed"),
        }
    }
    debug!("Redis publish worker stopped");
}

fn enqueue(sender: &mpsc::Sender<Notification>, notification: &Notification) -> PushResult<()> {
    match sender.try_send(notification.clone()) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(rejected)) => {
            Err(PushError::publish_failed(rejected.topic(), "publish queue full"))
        }
        Err(TrySendError::Closed(rejected)) => {
            Err(PushError::publish_failed(rejected.topic(), "publish worker stopped"))
        }
    }
}

impl ChangeSink for RedisSink {
    fn publish(&self, notification: &Notification) -> PushResult<()> {
        enqueue(&self.sender, notification)
    }
}
