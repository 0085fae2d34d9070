//! Speech-to-text fallback client (captions stage, last resort).

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tmark_models::YoutubeId;

use crate::error::{YoutubeError, YoutubeResult};

/// Configuration for the speech-to-text service client.
#[derive(Debug, Clone)]
pub struct SpeechClientConfig {
    /// Base URL of the transcription service
    pub base_url: String,
    /// Request timeout; transcription is slow, so this is generous
    pub timeout: Duration,
}

impl Default for SpeechClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl SpeechClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("STT_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: Duration::from_secs(
                std::env::var("STT_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.timeout.as_secs()),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
struct TranscribeRequest<'a> {
    video_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
}

/// Client for the transcription service.
pub struct SpeechClient {
    http: Client,
    config: SpeechClientConfig,
}

impl SpeechClient {
    /// Create a new client.
    pub fn new(config: SpeechClientConfig) -> YoutubeResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(YoutubeError::Network)?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> YoutubeResult<Self> {
        Self::new(SpeechClientConfig::from_env())
    }

    /// Check if the transcription service is reachable.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Transcribe a video's audio to plain text.
    ///
    /// The service only produces plain text, never VTT, so callers store the
    /// result as the transcript and leave the caption document empty.
    pub async fn transcribe(&self, id: &YoutubeId) -> YoutubeResult<String> {
        let url = format!("{}/transcribe", self.config.base_url);
        let watch_url = id.watch_url();

        debug!(video = %id, "Requesting speech-to-text transcription");

        let response = self
            .http
            .post(&url)
            .json(&TranscribeRequest {
                video_url: &watch_url,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(YoutubeError::Status { status, body });
        }

        let parsed: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| YoutubeError::parse(e.to_string()))?;

        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> SpeechClientConfig {
        SpeechClientConfig {
            base_url,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn transcribes_a_video() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transcribe"))
            .and(body_json(serde_json::json!({
                "video_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"text": "hello there"})),
            )
            .mount(&server)
            .await;

        let client = SpeechClient::new(test_config(server.uri())).unwrap();
        let id = YoutubeId::new("dQw4w9WgXcQ").unwrap();
        assert_eq!(client.transcribe(&id).await.unwrap(), "hello there");
    }

    #[tokio::test]
    async fn service_failure_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transcribe"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = SpeechClient::new(test_config(server.uri())).unwrap();
        let id = YoutubeId::new("dQw4w9WgXcQ").unwrap();
        let err = client.transcribe(&id).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
