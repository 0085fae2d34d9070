//! Worker error types.

use std::time::Duration;

use thiserror::Error;

use tmark_models::EnrichmentFailure;
use tmark_store::StoreError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] tmark_queue::QueueError),

    #[error("Source error: {0}")]
    Source(#[from] tmark_youtube::YoutubeError),

    #[error("Stage timed out after {0:?}")]
    StageTimeout(Duration),

    /// The video or its list was deleted; the run finalizes without further
    /// writes.
    #[error("Job canceled")]
    Canceled,

    #[error("Job failed: {0}")]
    JobFailed(String),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Whether the failing stage attempt should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Source(e) => e.is_retryable(),
            WorkerError::StageTimeout(_) => true,
            // Infrastructure blips; the stage retry also covers these.
            WorkerError::Store(e) => matches!(e, StoreError::Database(_)),
            WorkerError::Queue(_) => true,
            WorkerError::Canceled | WorkerError::JobFailed(_) => false,
        }
    }

    /// Terminal failure sub-reason for the affected video, given the stage
    /// that failed.
    pub fn failure_reason(&self, metadata_stage: bool) -> EnrichmentFailure {
        match self {
            WorkerError::Canceled => EnrichmentFailure::Canceled,
            WorkerError::StageTimeout(_) => EnrichmentFailure::Timeout,
            WorkerError::Source(tmark_youtube::YoutubeError::Unavailable) => {
                EnrichmentFailure::SourceUnavailable
            }
            _ if metadata_stage => EnrichmentFailure::MetadataFailed,
            _ => EnrichmentFailure::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_retryable() {
        assert!(WorkerError::StageTimeout(Duration::from_secs(20)).is_retryable());
    }

    #[test]
    fn cancellation_is_not_retryable() {
        assert!(!WorkerError::Canceled.is_retryable());
    }

    #[test]
    fn unavailable_source_maps_to_its_reason() {
        let err = WorkerError::Source(tmark_youtube::YoutubeError::Unavailable);
        assert_eq!(
            err.failure_reason(true),
            EnrichmentFailure::SourceUnavailable
        );
    }

    #[test]
    fn metadata_stage_failures_map_to_metadata_failed() {
        let err = WorkerError::job_failed("boom");
        assert_eq!(err.failure_reason(true), EnrichmentFailure::MetadataFailed);
    }
}
