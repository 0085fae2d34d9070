//! Per-video enrichment artifacts.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Enrichment record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    /// Finished, but a non-fatal stage degraded (e.g. no captions found)
    Partial,
    Failed,
}

impl EnrichmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentStatus::Pending => "pending",
            EnrichmentStatus::Processing => "processing",
            EnrichmentStatus::Completed => "completed",
            EnrichmentStatus::Partial => "partial",
            EnrichmentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EnrichmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EnrichmentStatus::Pending),
            "processing" => Ok(EnrichmentStatus::Processing),
            "completed" => Ok(EnrichmentStatus::Completed),
            "partial" => Ok(EnrichmentStatus::Partial),
            "failed" => Ok(EnrichmentStatus::Failed),
            other => Err(format!("unknown enrichment status: {other}")),
        }
    }
}

/// Where the stored captions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CaptionSource {
    /// Uploader-provided caption track
    Manual,
    /// Platform auto-generated captions
    Auto,
    /// Speech-to-text fallback service
    Speech,
}

impl CaptionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionSource::Manual => "manual",
            CaptionSource::Auto => "auto",
            CaptionSource::Speech => "speech",
        }
    }
}

impl std::str::FromStr for CaptionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(CaptionSource::Manual),
            "auto" => Ok(CaptionSource::Auto),
            "speech" => Ok(CaptionSource::Speech),
            other => Err(format!("unknown caption source: {other}")),
        }
    }
}

/// Where the stored chapters came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChapterSource {
    /// Platform-supplied chapter markers
    Platform,
    /// Parsed from timestamp lines in the description
    Description,
}

impl ChapterSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChapterSource::Platform => "platform",
            ChapterSource::Description => "description",
        }
    }
}

impl std::str::FromStr for ChapterSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "platform" => Ok(ChapterSource::Platform),
            "description" => Ok(ChapterSource::Description),
            other => Err(format!("unknown chapter source: {other}")),
        }
    }
}

/// A single chapter marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Chapter {
    pub title: String,
    pub start_secs: f64,
    /// End of the chapter; `None` for the last chapter (runs to video end)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_secs: Option<f64>,
}

/// One-to-one enrichment artifacts for a video.
///
/// `captions_vtt` is authoritative when a caption track exists; `transcript`
/// is derived from it. The speech-to-text fallback produces only plain text,
/// so in that case `captions_vtt` stays `None`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Enrichment {
    pub video_id: Uuid,
    pub status: EnrichmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captions_vtt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_source: Option<CaptionSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    pub chapters: Vec<Chapter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_source: Option<ChapterSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    pub retry_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Enrichment {
    /// Empty enrichment record created alongside a new video.
    pub fn new(video_id: Uuid) -> Self {
        Self {
            video_id,
            status: EnrichmentStatus::Pending,
            captions_vtt: None,
            caption_source: None,
            transcript: None,
            chapters: Vec::new(),
            chapter_source: None,
            progress_message: None,
            retry_count: 0,
            error_message: None,
            updated_at: Utc::now(),
        }
    }
}

/// The earliest stage whose artifacts are missing, used to resume a manual
/// retry without discarding prior successful work.
pub fn earliest_failed_stage(
    video: &crate::video::Video,
    enrichment: &Enrichment,
) -> crate::stage::Stage {
    use crate::stage::Stage;
    if video.duration_secs.is_none() {
        Stage::Metadata
    } else if enrichment.captions_vtt.is_none() && enrichment.transcript.is_none() {
        Stage::Captions
    } else {
        Stage::Chapters
    }
}

/// Terminal failure reasons for a single enrichment run.
///
/// These are surface-stable sub-reasons carried by the video's error state so
/// the UI can distinguish, for example, a removed video from a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentFailure {
    MetadataFailed,
    /// Video removed or private at the source
    SourceUnavailable,
    Timeout,
    Canceled,
}

impl EnrichmentFailure {
    pub fn code(&self) -> &'static str {
        match self {
            EnrichmentFailure::MetadataFailed => "metadata_failed",
            EnrichmentFailure::SourceUnavailable => "source_unavailable",
            EnrichmentFailure::Timeout => "timeout",
            EnrichmentFailure::Canceled => "canceled",
        }
    }
}

impl fmt::Display for EnrichmentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for status in [
            EnrichmentStatus::Pending,
            EnrichmentStatus::Processing,
            EnrichmentStatus::Completed,
            EnrichmentStatus::Partial,
            EnrichmentStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<EnrichmentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn failure_codes_are_stable() {
        assert_eq!(EnrichmentFailure::MetadataFailed.code(), "metadata_failed");
        assert_eq!(EnrichmentFailure::SourceUnavailable.code(), "source_unavailable");
        assert_eq!(EnrichmentFailure::Timeout.code(), "timeout");
        assert_eq!(EnrichmentFailure::Canceled.code(), "canceled");
    }

    #[test]
    fn chapter_serialization_omits_open_end() {
        let chapter = Chapter {
            title: "Intro".to_string(),
            start_secs: 0.0,
            end_secs: None,
        };
        let json = serde_json::to_string(&chapter).unwrap();
        assert!(!json.contains("end_secs"));
    }
}
