//! Queue job payloads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tmark_models::YoutubeId;

/// A request to run the enrichment pipeline for one video.
///
/// Enqueued once per accepted input of a bulk submission, and again on
/// manual retry. The idempotency key keeps a video from being enqueued twice
/// while a run is outstanding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichJob {
    /// Parent ingestion job
    pub job_id: Uuid,
    /// The per-video job row tracking stage/attempts
    pub video_job_id: Uuid,
    pub video_id: Uuid,
    pub list_id: Uuid,
    /// Owner of the list; progress events fan out on this user's topic
    pub user_id: String,
    pub youtube_id: YoutubeId,
}

impl EnrichJob {
    pub fn idempotency_key(&self) -> String {
        format!("enrich:{}", self.video_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_per_video() {
        let video_id = Uuid::new_v4();
        let a = EnrichJob {
            job_id: Uuid::new_v4(),
            video_job_id: Uuid::new_v4(),
            video_id,
            list_id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            youtube_id: YoutubeId::new("dQw4w9WgXcQ").unwrap(),
        };
        let b = EnrichJob {
            job_id: Uuid::new_v4(),
            video_job_id: Uuid::new_v4(),
            video_id,
            list_id: Uuid::new_v4(),
            user_id: "user-2".to_string(),
            youtube_id: YoutubeId::new("dQw4w9WgXcQ").unwrap(),
        };
        assert_eq!(a.idempotency_key(), b.idempotency_key());
    }

    #[test]
    fn round_trips_through_json() {
        let job = EnrichJob {
            job_id: Uuid::new_v4(),
            video_job_id: Uuid::new_v4(),
            video_id: Uuid::new_v4(),
            list_id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            youtube_id: YoutubeId::new("dQw4w9WgXcQ").unwrap(),
        };
        let json = serde_json::to_string(&job).unwrap();
        let parsed: EnrichJob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.video_id, job.video_id);
        assert_eq!(parsed.youtube_id, job.youtube_id);
    }
}
