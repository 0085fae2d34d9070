//! Per-video progress reporting.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use tmark_models::{ProgressEvent, Stage};
use tmark_queue::ProgressChannel;

use crate::throttle::ProgressThrottle;

/// Emits progress events for one video on its owner's topic.
///
/// Stage transitions and terminal events go out immediately; intermediate
/// ticks are throttled. Publish failures never fail the pipeline.
pub struct ProgressReporter {
    channel: Arc<ProgressChannel>,
    user_id: String,
    video_id: Uuid,
    throttle: Mutex<ProgressThrottle>,
}

impl ProgressReporter {
    pub fn new(
        channel: Arc<ProgressChannel>,
        user_id: impl Into<String>,
        video_id: Uuid,
        throttle: ProgressThrottle,
    ) -> Self {
        Self {
            channel,
            user_id: user_id.into(),
            video_id,
            throttle: Mutex::new(throttle),
        }
    }

    /// Emit a stage transition (always sent).
    pub async fn stage(&self, stage: Stage, message: Option<&str>) {
        let mut event = ProgressEvent::new(self.video_id, stage, stage.base_progress());
        if let Some(message) = message {
            event = event.with_message(message);
        }
        self.throttle.lock().await.allow(true);
        self.send(&event).await;
    }

    /// Emit an intermediate tick (throttled).
    pub async fn tick(&self, stage: Stage, progress: u8, message: Option<&str>) {
        if !self.throttle.lock().await.allow(false) {
            return;
        }
        let mut event = ProgressEvent::new(self.video_id, stage, progress);
        if let Some(message) = message {
            event = event.with_message(message);
        }
        self.send(&event).await;
    }

    async fn send(&self, event: &ProgressEvent) {
        if let Err(e) = self.channel.publish(&self.user_id, event).await {
            warn!(video_id = %self.video_id, "Failed to publish progress: {}", e);
        } else {
            metrics::counter!("tmark_progress_events_total").increment(1);
        }
    }
}
