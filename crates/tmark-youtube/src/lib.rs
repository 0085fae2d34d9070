//! Outbound clients for enrichment.
//!
//! Three sources feed the pipeline: the videos API for metadata, the
//! timedtext endpoint for caption tracks, and a speech-to-text service as
//! the captions fallback. Chapter extraction is pure and lives in
//! [`chapters`].
//!
//! None of the clients retry internally; retry policy belongs to the worker,
//! which owns attempt counting and backoff.

pub mod captions;
pub mod chapters;
pub mod client;
pub mod error;
pub mod stt;
pub mod types;

pub use captions::{vtt_to_transcript, CaptionClient, CaptionClientConfig};
pub use chapters::extract_chapters;
pub use client::{VideosClient, VideosClientConfig};
pub use error::{YoutubeError, YoutubeResult};
pub use stt::{SpeechClient, SpeechClientConfig};
pub use types::{CaptionDoc, CaptionTrack, TrackKind, VideoMetadata};
