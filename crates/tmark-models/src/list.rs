//! Video lists.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A per-user list of videos. Lists own their videos, custom fields, and
/// field schemas.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct List {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
