//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to enqueue job: {reason}")]
    EnqueueFailed { reason: String },
}

impl QueueError {
    pub fn enqueue_failed(reason: impl Into<String>) -> Self {
        Self::EnqueueFailed {
            reason: reason.into(),
        }
    }

    /// Duplicate enqueues are rejected with `EnqueueFailed`; callers that
    /// treat duplicates as success check this.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, QueueError::EnqueueFailed { .. })
    }
}
