//! Videos API client (metadata stage).

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use tmark_models::YoutubeId;

use crate::error::{YoutubeError, YoutubeResult};
use crate::types::VideoMetadata;

/// Configuration for the videos API client.
#[derive(Debug, Clone)]
pub struct VideosClientConfig {
    /// Base URL of the videos API
    pub base_url: String,
    /// API key appended to every request
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
}

impl VideosClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("YOUTUBE_API_BASE_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/youtube/v3".to_string()),
            api_key: std::env::var("YOUTUBE_API_KEY").unwrap_or_default(),
            timeout: Duration::from_secs(
                std::env::var("YOUTUBE_API_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: Snippet,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    #[serde(rename = "channelTitle")]
    channel_title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "publishedAt")]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

/// Client for the videos metadata API.
pub struct VideosClient {
    http: Client,
    config: VideosClientConfig,
}

impl VideosClient {
    /// Create a new client.
    pub fn new(config: VideosClientConfig) -> YoutubeResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(YoutubeError::Network)?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> YoutubeResult<Self> {
        Self::new(VideosClientConfig::from_env())
    }

    /// Fetch metadata for a video.
    ///
    /// An empty item list means the video is removed or private and maps to
    /// [`YoutubeError::Unavailable`].
    pub async fn fetch_metadata(&self, id: &YoutubeId) -> YoutubeResult<VideoMetadata> {
        let url = format!("{}/videos", self.config.base_url);
        debug!(video = %id, "Fetching video metadata");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("part", "snippet,contentDetails"),
                ("id", id.as_str()),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(YoutubeError::Status { status, body });
        }

        let parsed: VideosResponse = response
            .json()
            .await
            .map_err(|e| YoutubeError::parse(e.to_string()))?;

        let item = parsed.items.into_iter().next().ok_or(YoutubeError::Unavailable)?;

        let duration_secs = item
            .content_details
            .and_then(|cd| cd.duration)
            .and_then(|d| parse_iso8601_duration(&d));

        let thumbnail_url = item
            .snippet
            .thumbnails
            .medium
            .or(item.snippet.thumbnails.default)
            .map(|t| t.url);

        Ok(VideoMetadata {
            title: item.snippet.title,
            channel: item.snippet.channel_title,
            thumbnail_url,
            duration_secs,
            published_at: item.snippet.published_at,
            description: item.snippet.description,
        })
    }
}

/// Parse an ISO 8601 duration of the `PT#H#M#S` family into seconds.
pub fn parse_iso8601_duration(input: &str) -> Option<i32> {
    let rest = input.strip_prefix('P')?;
    let (days, rest) = match rest.split_once('D') {
        Some((d, rest)) => (d.parse::<i32>().ok()?, rest),
        None => (0, rest),
    };

    let mut secs = days * 86_400;
    if rest.is_empty() {
        return Some(secs);
    }

    let time = rest.strip_prefix('T')?;
    let mut number = String::new();
    for c in time.chars() {
        if c.is_ascii_digit() {
            number.push(c);
        } else {
            let value: i32 = number.parse().ok()?;
            number.clear();
            match c {
                'H' => secs += value * 3600,
                'M' => secs += value * 60,
                'S' => secs += value,
                _ => return None,
            }
        }
    }
    if !number.is_empty() {
        return None;
    }
    Some(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn iso8601_durations() {
        assert_eq!(parse_iso8601_duration("PT3M20S"), Some(200));
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), Some(3723));
        assert_eq!(parse_iso8601_duration("PT45S"), Some(45));
        assert_eq!(parse_iso8601_duration("PT2H"), Some(7200));
        assert_eq!(parse_iso8601_duration("P1DT1S"), Some(86_401));
        assert_eq!(parse_iso8601_duration("garbage"), None);
        assert_eq!(parse_iso8601_duration("PT5X"), None);
    }

    fn test_config(base_url: String) -> VideosClientConfig {
        VideosClientConfig {
            base_url,
            api_key: "test-key".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn fetches_and_maps_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("id", "dQw4w9WgXcQ"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "snippet": {
                        "title": "Test video",
                        "channelTitle": "Test channel",
                        "description": "0:00 Intro\n1:00 Main",
                        "publishedAt": "2024-01-02T03:04:05Z",
                        "thumbnails": {"medium": {"url": "https://img.example/medium.jpg"}}
                    },
                    "contentDetails": {"duration": "PT3M20S"}
                }]
            })))
            .mount(&server)
            .await;

        let client = VideosClient::new(test_config(server.uri())).unwrap();
        let id = YoutubeId::new("dQw4w9WgXcQ").unwrap();
        let metadata = client.fetch_metadata(&id).await.unwrap();

        assert_eq!(metadata.title, "Test video");
        assert_eq!(metadata.channel, "Test channel");
        assert_eq!(metadata.duration_secs, Some(200));
        assert_eq!(
            metadata.thumbnail_url.as_deref(),
            Some("https://img.example/medium.jpg")
        );
    }

    #[tokio::test]
    async fn empty_items_means_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(&server)
            .await;

        let client = VideosClient::new(test_config(server.uri())).unwrap();
        let id = YoutubeId::new("dQw4w9WgXcQ").unwrap();
        let err = client.fetch_metadata(&id).await.unwrap_err();
        assert!(matches!(err, YoutubeError::Unavailable));
    }

    #[tokio::test]
    async fn server_errors_surface_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = VideosClient::new(test_config(server.uri())).unwrap();
        let id = YoutubeId::new("dQw4w9WgXcQ").unwrap();
        let err = client.fetch_metadata(&id).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
