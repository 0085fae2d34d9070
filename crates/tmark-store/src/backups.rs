//! Category value backups.
//!
//! Snapshots are tiny and kept indefinitely as undo history, one per
//! `(video, category)` with the latest snapshot winning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::error::StoreResult;

/// One snapshotted value, stored column-wise like the live row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupValue {
    pub field_id: Uuid,
    pub value_text: Option<String>,
    pub value_numeric: Option<f64>,
    pub value_boolean: Option<bool>,
}

/// A snapshot of the values a video held while in a category.
#[derive(Debug, Clone)]
pub struct CategoryBackup {
    pub video_id: Uuid,
    pub category_tag_id: Uuid,
    pub category_name: String,
    pub values: Vec<BackupValue>,
    pub created_at: DateTime<Utc>,
}

/// Write (or overwrite) the snapshot for `(video, category)`.
pub async fn upsert(
    conn: &mut PgConnection,
    video_id: Uuid,
    category_tag_id: Uuid,
    category_name: &str,
    values: &[BackupValue],
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO field_value_backups (video_id, category_tag_id, category_name, payload, created_at)
        VALUES ($1, $2, $3, $4, now())
        ON CONFLICT (video_id, category_tag_id) DO UPDATE
        SET category_name = EXCLUDED.category_name,
            payload = EXCLUDED.payload,
            created_at = now()
        "#,
    )
    .bind(video_id)
    .bind(category_tag_id)
    .bind(category_name)
    .bind(serde_json::to_value(values)?)
    .execute(conn)
    .await?;
    Ok(())
}

/// Fetch the snapshot for `(video, category)`, if one exists.
pub async fn get(
    pool: &PgPool,
    video_id: Uuid,
    category_tag_id: Uuid,
) -> StoreResult<Option<CategoryBackup>> {
    let row = sqlx::query(
        r#"
        SELECT video_id, category_tag_id, category_name, payload, created_at
        FROM field_value_backups
        WHERE video_id = $1 AND category_tag_id = $2
        "#,
    )
    .bind(video_id)
    .bind(category_tag_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let payload: serde_json::Value = row.get("payload");
    Ok(Some(CategoryBackup {
        video_id: row.get("video_id"),
        category_tag_id: row.get("category_tag_id"),
        category_name: row.get("category_name"),
        values: serde_json::from_value(payload)?,
        created_at: row.get("created_at"),
    }))
}

/// Whether a snapshot exists for `(video, category)`.
pub async fn exists(
    conn: &mut PgConnection,
    video_id: Uuid,
    category_tag_id: Uuid,
) -> StoreResult<bool> {
    let row = sqlx::query(
        "SELECT EXISTS (SELECT 1 FROM field_value_backups WHERE video_id = $1 AND category_tag_id = $2) AS found",
    )
    .bind(video_id)
    .bind(category_tag_id)
    .fetch_one(conn)
    .await?;
    Ok(row.get::<bool, _>("found"))
}
