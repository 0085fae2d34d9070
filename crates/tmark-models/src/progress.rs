//! Progress events emitted by the enrichment worker.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stage::Stage;

/// One progress tick or state transition for a video.
///
/// Events for the same video are totally ordered by the worker that owns the
/// job; cross-video ordering is not guaranteed. History replay may deliver
/// duplicates, so clients dedupe by `(video_id, timestamp_ms)`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    pub video_id: Uuid,
    pub stage: Stage,
    /// 0-100
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

impl ProgressEvent {
    /// Create an event stamped with the current time.
    pub fn new(video_id: Uuid, stage: Stage, progress: u8) -> Self {
        Self {
            video_id,
            stage,
            progress: progress.min(100),
            message: None,
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Client-side dedup key.
    pub fn dedup_key(&self) -> (Uuid, i64) {
        (self.video_id, self.timestamp_ms)
    }

    /// Terminal events are never throttled or dropped.
    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_clamped() {
        let event = ProgressEvent::new(Uuid::new_v4(), Stage::Metadata, 150);
        assert_eq!(event.progress, 100);
    }

    #[test]
    fn terminal_detection() {
        let video_id = Uuid::new_v4();
        assert!(ProgressEvent::new(video_id, Stage::Complete, 100).is_terminal());
        assert!(ProgressEvent::new(video_id, Stage::Error, 100).is_terminal());
        assert!(!ProgressEvent::new(video_id, Stage::Captions, 50).is_terminal());
    }
}
