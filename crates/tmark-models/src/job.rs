//! Ingestion job records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stage::Stage;
use crate::video::ProcessingStatus;

/// Parent record for one bulk ingestion request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IngestionJob {
    pub id: Uuid,
    pub list_id: Uuid,
    pub user_id: String,
    /// Number of inputs submitted
    pub total: i32,
    /// Inputs that canonicalized and were queued
    pub accepted: i32,
    /// Inputs discarded during parsing/canonicalization
    pub rejected: i32,
    pub created_at: DateTime<Utc>,
}

/// Per-video child of an ingestion job.
///
/// `stage` only moves forward during a run; a manual retry resets it to the
/// earliest failed stage.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoJob {
    pub id: Uuid,
    pub job_id: Uuid,
    pub video_id: Uuid,
    pub status: ProcessingStatus,
    pub stage: Stage,
    pub attempts: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl VideoJob {
    pub fn new(job_id: Uuid, video_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            video_id,
            status: ProcessingStatus::Pending,
            stage: Stage::Created,
            attempts: 0,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}
