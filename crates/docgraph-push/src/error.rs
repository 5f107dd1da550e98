//! Error types for change notification.

use thiserror::Error;

/// Push error type.
#[derive(Error, Debug)]
pub enum PushError {
    /// A notification could not be handed to the transport.
    #[error("Publish to {topic} failed: {reason}")]
    PublishFailed { topic: String, reason: String },

    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl PushError {
    pub fn publish_failed(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PublishFailed {
            topic: topic.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using PushError.
pub type PushResult<T> = Result<T, PushError>;
