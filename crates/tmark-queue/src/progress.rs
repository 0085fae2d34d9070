//! Progress transport: durable history plus Pub/Sub fan-out.
//!
//! Every event is dual-written in a fixed order: the per-video history ring
//! must be appended before the Pub/Sub publish. History replay is
//! at-least-once (clients dedupe by `(video_id, timestamp)`); Pub/Sub is
//! best-effort.

use redis::AsyncCommands;
use tracing::{debug, warn};
use uuid::Uuid;

use tmark_models::ProgressEvent;

use crate::error::QueueResult;

/// Default size of the per-video history ring.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// History entries expire with their video activity; long-lived sessions
/// reconcile through the regular detail endpoint instead.
const HISTORY_TTL_SECS: i64 = 86400;

/// Server-side cap on a single history replay.
const REPLAY_CAP: usize = 500;

/// Cancellation flags outlive the worker check interval by a wide margin.
const CANCEL_TTL_SECS: u64 = 3600;

fn user_channel(user_id: &str) -> String {
    format!("tmark:progress:user:{user_id}")
}

fn history_key(video_id: Uuid) -> String {
    format!("tmark:progress:history:{video_id}")
}

fn cancel_key(video_id: Uuid) -> String {
    format!("tmark:cancel:{video_id}")
}

/// Channel for publishing and replaying progress events.
#[derive(Clone)]
pub struct ProgressChannel {
    client: redis::Client,
    history_limit: usize,
}

impl ProgressChannel {
    /// Create a new progress channel.
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            history_limit: DEFAULT_HISTORY_LIMIT,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let mut channel = Self::new(&redis_url)?;
        if let Some(limit) = std::env::var("PROGRESS_HISTORY_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            channel.history_limit = limit;
        }
        Ok(channel)
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Publish a progress event for a user.
    ///
    /// The history append must succeed before the publish is attempted; a
    /// failed publish is logged and swallowed (live listeners will catch up
    /// from history).
    pub async fn publish(&self, user_id: &str, event: &ProgressEvent) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(event)?;
        let key = history_key(event.video_id);
        let score = event.timestamp_ms as f64;

        // Append + cap the ring + refresh TTL atomically.
        redis::pipe()
            .zadd(&key, &payload, score)
            .ignore()
            .zremrangebyrank(&key, 0, -(self.history_limit as isize) - 1)
            .ignore()
            .expire(&key, HISTORY_TTL_SECS)
            .ignore()
            .exec_async(&mut conn)
            .await?;

        let channel = user_channel(user_id);
        if let Err(e) = conn.publish::<_, _, ()>(&channel, &payload).await {
            warn!(video_id = %event.video_id, "Progress publish failed: {}", e);
        }

        debug!(
            video_id = %event.video_id,
            stage = %event.stage,
            progress = event.progress,
            "Published progress event"
        );

        Ok(())
    }

    /// History events for a video strictly newer than `since_ms`, ordered by
    /// timestamp, bounded by the server replay cap.
    pub async fn history_since(
        &self,
        video_id: Uuid,
        since_ms: i64,
    ) -> QueueResult<Vec<ProgressEvent>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = history_key(video_id);

        let raw: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(&key)
            .arg(format!("({since_ms}"))
            .arg("+inf")
            .arg("LIMIT")
            .arg(0)
            .arg(REPLAY_CAP)
            .query_async(&mut conn)
            .await?;

        let events = raw
            .into_iter()
            .filter_map(|s| serde_json::from_str(&s).ok())
            .collect();

        Ok(events)
    }

    /// Subscribe to a user's live progress events.
    /// Returns a pinned stream that can be polled with `.next()`.
    pub async fn subscribe(
        &self,
        user_id: &str,
    ) -> QueueResult<std::pin::Pin<Box<dyn futures_util::Stream<Item = ProgressEvent> + Send>>>
    {
        use futures_util::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(user_channel(user_id)).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }

    // ========================================================================
    // Cancellation flags
    // ========================================================================

    /// Flag a video's outstanding work for cancellation. The worker checks
    /// the flag at every suspension point.
    pub async fn request_cancel(&self, video_id: Uuid) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(cancel_key(video_id), "1", CANCEL_TTL_SECS)
            .await?;
        debug!(video_id = %video_id, "Requested cancellation");
        Ok(())
    }

    /// Check whether a video's work has been canceled.
    pub async fn is_canceled(&self, video_id: Uuid) -> QueueResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let exists: bool = conn.exists(cancel_key(video_id)).await?;
        Ok(exists)
    }

    /// Clear a cancellation flag once the worker has finalized the video.
    pub async fn clear_cancel(&self, video_id: Uuid) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(cancel_key(video_id)).await?;
        Ok(())
    }
}
