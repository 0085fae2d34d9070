//! Video domain models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of a canonical YouTube video identifier.
pub const YOUTUBE_ID_LEN: usize = 11;

/// Canonical 11-character YouTube video identifier.
///
/// This is the sole deduplication key for ingestion: two URLs that
/// canonicalize to the same `YoutubeId` are the same video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct YoutubeId(String);

impl YoutubeId {
    /// Wrap a raw identifier, returning `None` unless it is exactly eleven
    /// characters of `[A-Za-z0-9_-]`.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if Self::is_valid(&raw) {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Check whether a string is a well-formed video identifier.
    pub fn is_valid(s: &str) -> bool {
        s.len() == YOUTUBE_ID_LEN
            && s.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL for this video.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for YoutubeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for YoutubeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Video processing status as seen by list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Queued, not yet picked up by a worker
    #[default]
    Pending,
    /// A worker is driving the enrichment pipeline
    Processing,
    /// Enrichment finished (possibly with partial artifacts)
    Completed,
    /// Enrichment failed terminally for this run
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(format!("unknown processing status: {other}")),
        }
    }
}

/// A video owned by a list.
///
/// Unique per `(list_id, youtube_id)`. Metadata fields stay `None` until the
/// metadata stage of enrichment has run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Video {
    pub id: Uuid,
    pub list_id: Uuid,
    pub youtube_id: YoutubeId,
    pub title: String,
    pub channel: Option<String>,
    /// Raw description; chapter markers are extracted from it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Duration in seconds, nullable until enriched
    pub duration_secs: Option<i32>,
    pub published_at: Option<DateTime<Utc>>,
    pub processing_status: ProcessingStatus,
    /// Player resume position in seconds
    pub watch_position_secs: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Create a freshly ingested video row. The title defaults to the watch
    /// URL until metadata arrives.
    pub fn new(list_id: Uuid, youtube_id: YoutubeId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            list_id,
            title: youtube_id.watch_url(),
            youtube_id,
            channel: None,
            description: None,
            thumbnail_url: None,
            duration_secs: None,
            published_at: None,
            processing_status: ProcessingStatus::Pending,
            watch_position_secs: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_youtube_ids() {
        assert!(YoutubeId::new("dQw4w9WgXcQ").is_some());
        assert!(YoutubeId::new("abc-DEF_123").is_some());
    }

    #[test]
    fn invalid_youtube_ids() {
        assert!(YoutubeId::new("short").is_none());
        assert!(YoutubeId::new("twelve-chars0").is_none());
        assert!(YoutubeId::new("has spaces!").is_none());
        assert!(YoutubeId::new("").is_none());
    }

    #[test]
    fn watch_url_round_trip() {
        let id = YoutubeId::new("dQw4w9WgXcQ").unwrap();
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn status_round_trip() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ProcessingStatus>().unwrap(), status);
        }
    }

    #[test]
    fn new_video_defaults() {
        let list_id = Uuid::new_v4();
        let video = Video::new(list_id, YoutubeId::new("dQw4w9WgXcQ").unwrap());
        assert_eq!(video.processing_status, ProcessingStatus::Pending);
        assert!(video.duration_secs.is_none());
        assert!(video.title.contains("dQw4w9WgXcQ"));
    }
}
