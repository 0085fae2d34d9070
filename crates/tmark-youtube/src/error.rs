//! Client error types.

use thiserror::Error;

pub type YoutubeResult<T> = Result<T, YoutubeError>;

#[derive(Debug, Error)]
pub enum YoutubeError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The video is removed, private, or otherwise gone at the source.
    /// Distinguished so the UI can offer "open on source".
    #[error("Video is unavailable at the source")]
    Unavailable,

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl YoutubeError {
    pub fn parse(detail: impl Into<String>) -> Self {
        Self::Parse(detail.into())
    }

    /// Whether the worker should count this as a transient failure and
    /// retry the stage.
    pub fn is_retryable(&self) -> bool {
        match self {
            YoutubeError::Network(_) => true,
            YoutubeError::Status { status, .. } => *status >= 500 || *status == 429,
            YoutubeError::Unavailable | YoutubeError::Parse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        assert!(YoutubeError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(YoutubeError::Status {
            status: 429,
            body: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn client_errors_are_fatal() {
        assert!(!YoutubeError::Status {
            status: 403,
            body: String::new()
        }
        .is_retryable());
        assert!(!YoutubeError::Unavailable.is_retryable());
        assert!(!YoutubeError::parse("bad json").is_retryable());
    }
}
