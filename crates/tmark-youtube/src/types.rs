//! Client-side data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tmark_models::CaptionSource;

/// Metadata fetched for a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub channel: String,
    pub thumbnail_url: Option<String>,
    pub duration_secs: Option<i32>,
    pub published_at: Option<DateTime<Utc>>,
    /// Raw description, kept for chapter extraction
    pub description: String,
}

/// Kind of caption track offered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Uploader-provided
    Manual,
    /// Auto-generated ("asr")
    Auto,
}

impl TrackKind {
    pub fn caption_source(&self) -> CaptionSource {
        match self {
            TrackKind::Manual => CaptionSource::Manual,
            TrackKind::Auto => CaptionSource::Auto,
        }
    }
}

/// One available caption track.
#[derive(Debug, Clone)]
pub struct CaptionTrack {
    pub lang: String,
    pub kind: TrackKind,
    pub name: Option<String>,
}

/// A fetched caption document.
#[derive(Debug, Clone)]
pub struct CaptionDoc {
    pub vtt: String,
    pub source: CaptionSource,
}
