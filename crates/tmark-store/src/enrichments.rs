//! Enrichment repo.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use tmark_models::{CaptionSource, Chapter, ChapterSource, Enrichment, EnrichmentStatus};

use crate::error::{or_not_found, StoreResult};
use crate::videos::decode;

fn row_to_enrichment(row: &PgRow) -> StoreResult<Enrichment> {
    let status: String = row.get("status");
    let caption_source: Option<String> = row.get("caption_source");
    let chapter_source: Option<String> = row.get("chapter_source");
    let chapters: serde_json::Value = row.get("chapters");

    Ok(Enrichment {
        video_id: row.get("video_id"),
        status: status.parse::<EnrichmentStatus>().map_err(decode)?,
        captions_vtt: row.get("captions_vtt"),
        caption_source: caption_source
            .map(|s| s.parse::<CaptionSource>().map_err(decode))
            .transpose()?,
        transcript: row.get("transcript"),
        chapters: serde_json::from_value::<Vec<Chapter>>(chapters)?,
        chapter_source: chapter_source
            .map(|s| s.parse::<ChapterSource>().map_err(decode))
            .transpose()?,
        progress_message: row.get("progress_message"),
        retry_count: row.get("retry_count"),
        error_message: row.get("error_message"),
        updated_at: row.get("updated_at"),
    })
}

/// Create the empty enrichment row for a new video (no-op if present).
pub async fn ensure(conn: &mut PgConnection, video_id: Uuid) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO enrichments (video_id)
        VALUES ($1)
        ON CONFLICT (video_id) DO NOTHING
        "#,
    )
    .bind(video_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Fetch a video's enrichment.
pub async fn get(pool: &PgPool, video_id: Uuid) -> StoreResult<Enrichment> {
    let row = sqlx::query("SELECT * FROM enrichments WHERE video_id = $1")
        .bind(video_id)
        .fetch_one(pool)
        .await
        .map_err(|e| or_not_found(e, "enrichment"))?;
    row_to_enrichment(&row)
}

/// Mark the run as started and clear leftovers from a previous failure.
pub async fn start_run(pool: &PgPool, video_id: Uuid) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE enrichments
        SET status = 'processing', error_message = NULL, progress_message = NULL,
            updated_at = now()
        WHERE video_id = $1
        "#,
    )
    .bind(video_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Store fetched captions. The VTT document is authoritative when present;
/// the speech-to-text fallback stores only a transcript.
pub async fn save_captions(
    pool: &PgPool,
    video_id: Uuid,
    captions_vtt: Option<&str>,
    source: Option<CaptionSource>,
    transcript: Option<&str>,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE enrichments
        SET captions_vtt = $2, caption_source = $3, transcript = $4, updated_at = now()
        WHERE video_id = $1
        "#,
    )
    .bind(video_id)
    .bind(captions_vtt)
    .bind(source.map(|s| s.as_str()))
    .bind(transcript)
    .execute(pool)
    .await?;
    Ok(())
}

/// Store extracted chapters.
pub async fn save_chapters(
    pool: &PgPool,
    video_id: Uuid,
    chapters: &[Chapter],
    source: Option<ChapterSource>,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE enrichments
        SET chapters = $2, chapter_source = $3, updated_at = now()
        WHERE video_id = $1
        "#,
    )
    .bind(video_id)
    .bind(serde_json::to_value(chapters)?)
    .bind(source.map(|s| s.as_str()))
    .execute(pool)
    .await?;
    Ok(())
}

/// Update the human-readable progress message.
pub async fn set_progress_message(
    pool: &PgPool,
    video_id: Uuid,
    message: &str,
) -> StoreResult<()> {
    sqlx::query(
        "UPDATE enrichments SET progress_message = $2, updated_at = now() WHERE video_id = $1",
    )
    .bind(video_id)
    .bind(message)
    .execute(pool)
    .await?;
    Ok(())
}

/// Count one more retry for this video's enrichment.
pub async fn increment_retry(pool: &PgPool, video_id: Uuid) -> StoreResult<()> {
    sqlx::query(
        "UPDATE enrichments SET retry_count = retry_count + 1, updated_at = now() WHERE video_id = $1",
    )
    .bind(video_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Terminal write for the run: completed, partial, or failed.
pub async fn finalize(
    pool: &PgPool,
    video_id: Uuid,
    status: EnrichmentStatus,
    error_message: Option<&str>,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE enrichments
        SET status = $2, error_message = $3, progress_message = NULL, updated_at = now()
        WHERE video_id = $1
        "#,
    )
    .bind(video_id)
    .bind(status.as_str())
    .bind(error_message)
    .execute(pool)
    .await?;
    Ok(())
}
