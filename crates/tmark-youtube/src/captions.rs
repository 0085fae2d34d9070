//! Caption track discovery and retrieval (captions stage).

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use tmark_models::YoutubeId;

use crate::error::{YoutubeError, YoutubeResult};
use crate::types::{CaptionDoc, CaptionTrack, TrackKind};

/// Configuration for the timedtext caption client.
#[derive(Debug, Clone)]
pub struct CaptionClientConfig {
    /// Base URL of the timedtext endpoint
    pub base_url: String,
    /// Preferred caption language
    pub preferred_lang: String,
    /// Request timeout
    pub timeout: Duration,
}

impl CaptionClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("TIMEDTEXT_BASE_URL")
                .unwrap_or_else(|_| "https://video.google.com".to_string()),
            preferred_lang: std::env::var("CAPTION_LANG").unwrap_or_else(|_| "en".to_string()),
            timeout: Duration::from_secs(
                std::env::var("TIMEDTEXT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

/// Client for platform caption tracks.
pub struct CaptionClient {
    http: Client,
    config: CaptionClientConfig,
}

impl CaptionClient {
    /// Create a new client.
    pub fn new(config: CaptionClientConfig) -> YoutubeResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(YoutubeError::Network)?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> YoutubeResult<Self> {
        Self::new(CaptionClientConfig::from_env())
    }

    /// List the caption tracks available for a video. An empty list is a
    /// normal outcome, not an error.
    pub async fn list_tracks(&self, id: &YoutubeId) -> YoutubeResult<Vec<CaptionTrack>> {
        let url = format!("{}/timedtext", self.config.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("type", "list"), ("v", id.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(YoutubeError::Status { status, body });
        }

        let body = response.text().await?;
        Ok(parse_track_list(&body))
    }

    /// Fetch one caption track as VTT.
    pub async fn fetch_track(
        &self,
        id: &YoutubeId,
        track: &CaptionTrack,
    ) -> YoutubeResult<CaptionDoc> {
        let url = format!("{}/timedtext", self.config.base_url);

        let mut query: Vec<(&str, &str)> = vec![
            ("v", id.as_str()),
            ("lang", track.lang.as_str()),
            ("fmt", "vtt"),
        ];
        if track.kind == TrackKind::Auto {
            query.push(("kind", "asr"));
        }
        if let Some(name) = &track.name {
            query.push(("name", name.as_str()));
        }

        let response = self.http.get(&url).query(&query).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(YoutubeError::Status { status, body });
        }

        let vtt = response.text().await?;
        if vtt.trim().is_empty() {
            return Err(YoutubeError::parse("empty caption document"));
        }

        debug!(video = %id, lang = %track.lang, "Fetched caption track");
        Ok(CaptionDoc {
            vtt,
            source: track.kind.caption_source(),
        })
    }

    /// Pick the best track: a manual track in the preferred language, any
    /// manual track, then the same preference among auto tracks.
    pub fn select_track<'a>(&self, tracks: &'a [CaptionTrack]) -> Option<&'a CaptionTrack> {
        let lang = self.config.preferred_lang.as_str();
        let pick = |kind: TrackKind| {
            tracks
                .iter()
                .find(|t| t.kind == kind && t.lang.starts_with(lang))
                .or_else(|| tracks.iter().find(|t| t.kind == kind))
        };
        pick(TrackKind::Manual).or_else(|| pick(TrackKind::Auto))
    }
}

/// Parse the timedtext track-list XML. Malformed input yields no tracks.
fn parse_track_list(xml: &str) -> Vec<CaptionTrack> {
    let Ok(document) = roxmltree::Document::parse(xml) else {
        return Vec::new();
    };

    document
        .descendants()
        .filter(|node| node.has_tag_name("track"))
        .filter_map(|node| {
            let lang = node.attribute("lang_code")?.to_string();
            let kind = match node.attribute("kind") {
                Some("asr") => TrackKind::Auto,
                _ => TrackKind::Manual,
            };
            let name = node
                .attribute("name")
                .filter(|n| !n.is_empty())
                .map(|n| n.to_string());
            Some(CaptionTrack { lang, kind, name })
        })
        .collect()
}

/// Derive a plain transcript from a VTT document.
///
/// Cue timings, settings, positioning tags, and duplicate rollup lines are
/// dropped; what remains is the spoken text in order.
pub fn vtt_to_transcript(vtt: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for raw in vtt.lines() {
        let line = raw.trim();
        if line.is_empty()
            || line.starts_with("WEBVTT")
            || line.starts_with("NOTE")
            || line.starts_with("STYLE")
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
            || line.contains("-->")
            // Bare cue identifiers
            || line.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }

        let text = strip_tags(line);
        if text.is_empty() {
            continue;
        }
        // Auto captions repeat the previous line as context; drop immediate
        // duplicates.
        if lines.last().map(String::as_str) == Some(text.as_str()) {
            continue;
        }
        lines.push(text);
    }

    lines.join("\n")
}

fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK_LIST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<transcript_list docid="1">
  <track id="0" name="" lang_code="en" lang_original="English"/>
  <track id="1" name="" lang_code="de" lang_original="Deutsch"/>
  <track id="2" name="" lang_code="en" kind="asr" lang_original="English"/>
</transcript_list>"#;

    #[test]
    fn parses_track_list() {
        let tracks = parse_track_list(TRACK_LIST);
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks[0].kind, TrackKind::Manual);
        assert_eq!(tracks[2].kind, TrackKind::Auto);
    }

    #[test]
    fn malformed_track_list_yields_empty() {
        assert!(parse_track_list("not xml").is_empty());
        assert!(parse_track_list("").is_empty());
    }

    #[test]
    fn selects_manual_preferred_language_first() {
        let config = CaptionClientConfig {
            base_url: String::new(),
            preferred_lang: "en".to_string(),
            timeout: Duration::from_secs(1),
        };
        let client = CaptionClient::new(config).unwrap();

        let tracks = parse_track_list(TRACK_LIST);
        let selected = client.select_track(&tracks).unwrap();
        assert_eq!(selected.lang, "en");
        assert_eq!(selected.kind, TrackKind::Manual);
    }

    #[test]
    fn falls_back_to_auto_when_no_manual() {
        let config = CaptionClientConfig {
            base_url: String::new(),
            preferred_lang: "en".to_string(),
            timeout: Duration::from_secs(1),
        };
        let client = CaptionClient::new(config).unwrap();

        let tracks = vec![CaptionTrack {
            lang: "en".to_string(),
            kind: TrackKind::Auto,
            name: None,
        }];
        let selected = client.select_track(&tracks).unwrap();
        assert_eq!(selected.kind, TrackKind::Auto);
    }

    #[test]
    fn no_tracks_selects_none() {
        let config = CaptionClientConfig {
            base_url: String::new(),
            preferred_lang: "en".to_string(),
            timeout: Duration::from_secs(1),
        };
        let client = CaptionClient::new(config).unwrap();
        assert!(client.select_track(&[]).is_none());
    }

    #[test]
    fn vtt_transcript_strips_timing_and_tags() {
        let vtt = "WEBVTT\nKind: captions\nLanguage: en\n\n00:00:00.000 --> 00:00:02.000\nHello <b>world</b>\n\n2\n00:00:02.000 --> 00:00:04.000\nHello world\nSecond line\n";
        let transcript = vtt_to_transcript(vtt);
        assert_eq!(transcript, "Hello world\nSecond line");
    }

    #[test]
    fn empty_vtt_yields_empty_transcript() {
        assert_eq!(vtt_to_transcript("WEBVTT\n\n"), "");
    }
}
