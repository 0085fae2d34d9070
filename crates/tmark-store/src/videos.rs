//! Video repo.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use tmark_models::{ProcessingStatus, Video, YoutubeId};

use crate::error::{or_not_found, StoreError, StoreResult};

pub(crate) fn decode(msg: String) -> StoreError {
    StoreError::Database(sqlx::Error::Decode(msg.into()))
}

pub(crate) fn row_to_video(row: &PgRow) -> StoreResult<Video> {
    let youtube_id: String = row.get("youtube_id");
    let status: String = row.get("processing_status");
    Ok(Video {
        id: row.get("id"),
        list_id: row.get("list_id"),
        youtube_id: YoutubeId::new(youtube_id.trim())
            .ok_or_else(|| decode("invalid youtube_id in row".to_string()))?,
        title: row.get("title"),
        channel: row.get("channel"),
        description: row.get("description"),
        thumbnail_url: row.get("thumbnail_url"),
        duration_secs: row.get("duration_secs"),
        published_at: row.get("published_at"),
        processing_status: status.parse::<ProcessingStatus>().map_err(decode)?,
        watch_position_secs: row.get("watch_position_secs"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const VIDEO_COLUMNS: &str = "id, list_id, youtube_id, title, channel, description, \
     thumbnail_url, duration_secs, published_at, processing_status, watch_position_secs, \
     created_at, updated_at";

/// Fetch a video by id.
pub async fn get(pool: &PgPool, video_id: Uuid) -> StoreResult<Video> {
    let row = sqlx::query(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"))
        .bind(video_id)
        .fetch_one(pool)
        .await
        .map_err(|e| or_not_found(e, "video"))?;
    row_to_video(&row)
}

/// Fetch a video, verifying the requesting user owns its list.
pub async fn get_for_user(pool: &PgPool, user_id: &str, video_id: Uuid) -> StoreResult<Video> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {VIDEO_COLUMNS} FROM videos v
        WHERE v.id = $1
          AND EXISTS (SELECT 1 FROM lists l WHERE l.id = v.list_id AND l.user_id = $2)
        "#
    ))
    .bind(video_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| or_not_found(e, "video"))?;
    row_to_video(&row)
}

/// Videos of a list, newest first.
pub async fn list_for_list(pool: &PgPool, list_id: Uuid) -> StoreResult<Vec<Video>> {
    let rows = sqlx::query(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos WHERE list_id = $1 ORDER BY created_at DESC"
    ))
    .bind(list_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(row_to_video).collect()
}

/// Insert a freshly ingested video, or return the existing row for the same
/// `(list_id, youtube_id)`. The boolean is `true` when the row was created.
pub async fn insert_if_absent(
    conn: &mut PgConnection,
    list_id: Uuid,
    youtube_id: &YoutubeId,
) -> StoreResult<(Video, bool)> {
    let candidate = Video::new(list_id, youtube_id.clone());

    let inserted = sqlx::query(&format!(
        r#"
        INSERT INTO videos (id, list_id, youtube_id, title, processing_status)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (list_id, youtube_id) DO NOTHING
        RETURNING {VIDEO_COLUMNS}
        "#
    ))
    .bind(candidate.id)
    .bind(list_id)
    .bind(youtube_id.as_str())
    .bind(&candidate.title)
    .bind(candidate.processing_status.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = inserted {
        return Ok((row_to_video(&row)?, true));
    }

    let row = sqlx::query(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos WHERE list_id = $1 AND youtube_id = $2"
    ))
    .bind(list_id)
    .bind(youtube_id.as_str())
    .fetch_one(&mut *conn)
    .await?;
    Ok((row_to_video(&row)?, false))
}

/// Apply fetched metadata. Only the worker calls this.
pub async fn apply_metadata(
    pool: &PgPool,
    video_id: Uuid,
    title: &str,
    channel: &str,
    description: &str,
    thumbnail_url: Option<&str>,
    duration_secs: Option<i32>,
    published_at: Option<chrono::DateTime<chrono::Utc>>,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE videos
        SET title = $2, channel = $3, description = $4, thumbnail_url = $5,
            duration_secs = $6, published_at = $7, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(video_id)
    .bind(title)
    .bind(channel)
    .bind(description)
    .bind(thumbnail_url)
    .bind(duration_secs)
    .bind(published_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Set the processing status. Only the worker calls this.
pub async fn set_status(pool: &PgPool, video_id: Uuid, status: ProcessingStatus) -> StoreResult<()> {
    sqlx::query("UPDATE videos SET processing_status = $2, updated_at = now() WHERE id = $1")
        .bind(video_id)
        .bind(status.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

/// Update the player resume position.
pub async fn set_watch_position(
    pool: &PgPool,
    user_id: &str,
    video_id: Uuid,
    position_secs: Option<i32>,
) -> StoreResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE videos v
        SET watch_position_secs = $3, updated_at = now()
        WHERE v.id = $1
          AND EXISTS (SELECT 1 FROM lists l WHERE l.id = v.list_id AND l.user_id = $2)
        "#,
    )
    .bind(video_id)
    .bind(user_id)
    .bind(position_secs)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("video"));
    }
    Ok(())
}

/// Delete a video. Cascades to enrichment, values, and tag attachments.
pub async fn delete(pool: &PgPool, user_id: &str, video_id: Uuid) -> StoreResult<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM videos v
        WHERE v.id = $1
          AND EXISTS (SELECT 1 FROM lists l WHERE l.id = v.list_id AND l.user_id = $2)
        "#,
    )
    .bind(video_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("video"));
    }
    Ok(())
}

/// Ids of every video in the user's lists, for history replay fan-out.
pub async fn ids_for_user(pool: &PgPool, user_id: &str) -> StoreResult<Vec<Uuid>> {
    let rows = sqlx::query(
        r#"
        SELECT v.id FROM videos v
        JOIN lists l ON l.id = v.list_id
        WHERE l.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(|row| row.get("id")).collect())
}

/// Whether the video row still exists; the worker checks this around
/// suspension points.
pub async fn exists(pool: &PgPool, video_id: Uuid) -> StoreResult<bool> {
    let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM videos WHERE id = $1) AS found")
        .bind(video_id)
        .fetch_one(pool)
        .await?;
    Ok(row.get::<bool, _>("found"))
}
