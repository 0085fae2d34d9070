//! WebSocket frame types.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::progress::ProgressEvent;
use crate::stage::Stage;

/// Close code: client failed to authenticate within the deadline.
pub const CLOSE_AUTH_TIMEOUT: u16 = 4001;
/// Close code: authentication frame carried an invalid token.
pub const CLOSE_AUTH_FAILED: u16 = 4003;
/// Close code: connection too slow to accept a terminal event.
pub const CLOSE_BACKPRESSURE: u16 = 4008;

/// Frames the client sends.
///
/// The token travels in the first frame, never in the connection URL, so it
/// cannot leak into proxy logs or browser history.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Auth {
        token: String,
    },
    /// Replay history events newer than `since` (ms since epoch), optionally
    /// narrowed to specific videos, then resume live forwarding.
    History {
        since: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        video_ids: Option<Vec<Uuid>>,
    },
    Ping,
}

/// Frames the server sends.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    AuthOk,
    AuthFailed,
    Progress {
        video_id: Uuid,
        stage: Stage,
        progress: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Pong,
    Error {
        code: String,
        message: String,
    },
}

impl ServerFrame {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether this frame may be dropped under backpressure. Only
    /// intermediate progress is expendable; terminal progress and everything
    /// else must be delivered.
    pub fn droppable(&self) -> bool {
        matches!(
            self,
            ServerFrame::Progress { stage, .. } if !stage.is_terminal()
        )
    }
}

impl From<&ProgressEvent> for ServerFrame {
    fn from(event: &ProgressEvent) -> Self {
        ServerFrame::Progress {
            video_id: event.video_id,
            stage: event.stage,
            progress: event.progress,
            message: event.message.clone(),
            timestamp: DateTime::<Utc>::from_timestamp_millis(event.timestamp_ms)
                .unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_frame_shape() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type":"auth","token":"t"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Auth { token } if token == "t"));
    }

    #[test]
    fn history_frame_defaults() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"history","since":100}"#).unwrap();
        match frame {
            ClientFrame::History { since, video_ids } => {
                assert_eq!(since, 100);
                assert!(video_ids.is_none());
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn progress_frame_serialization() {
        let event = ProgressEvent::new(Uuid::new_v4(), Stage::Captions, 50);
        let frame = ServerFrame::from(&event);
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"progress\""));
        assert!(json.contains("\"stage\":\"captions\""));
    }

    #[test]
    fn only_intermediate_progress_is_droppable() {
        let video_id = Uuid::new_v4();
        let mid = ServerFrame::from(&ProgressEvent::new(video_id, Stage::Metadata, 20));
        let done = ServerFrame::from(&ProgressEvent::new(video_id, Stage::Complete, 100));
        assert!(mid.droppable());
        assert!(!done.droppable());
        assert!(!ServerFrame::Pong.droppable());
    }
}
