//! Ingestion job repo.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use tmark_models::{IngestionJob, ProcessingStatus, Stage, VideoJob, YoutubeId};

use crate::error::{or_not_found, StoreResult};
use crate::videos::decode;
use crate::{enrichments, videos};

fn row_to_job(row: &PgRow) -> IngestionJob {
    IngestionJob {
        id: row.get("id"),
        list_id: row.get("list_id"),
        user_id: row.get("user_id"),
        total: row.get("total"),
        accepted: row.get("accepted"),
        rejected: row.get("rejected"),
        created_at: row.get("created_at"),
    }
}

fn row_to_video_job(row: &PgRow) -> StoreResult<VideoJob> {
    let status: String = row.get("status");
    let stage: String = row.get("stage");
    Ok(VideoJob {
        id: row.get("id"),
        job_id: row.get("job_id"),
        video_id: row.get("video_id"),
        status: status.parse::<ProcessingStatus>().map_err(decode)?,
        stage: stage.parse::<Stage>().map_err(decode)?,
        attempts: row.get("attempts"),
        last_error: row.get("last_error"),
        updated_at: row.get("updated_at"),
    })
}

/// A video queued by a bulk submission, ready to hand to the job queue.
#[derive(Debug, Clone)]
pub struct QueuedVideo {
    pub video_job_id: Uuid,
    pub video_id: Uuid,
    pub youtube_id: YoutubeId,
}

/// Outcome of recording a bulk submission.
#[derive(Debug)]
pub struct BulkIngest {
    pub job: IngestionJob,
    /// Videos that actually need an enrichment run. Already-completed
    /// duplicates are accepted but not re-queued.
    pub queued: Vec<QueuedVideo>,
}

/// Record a bulk submission: create missing video rows, the parent job, and
/// one child job per video that needs enrichment. One transaction.
pub async fn create_bulk(
    pool: &PgPool,
    list_id: Uuid,
    user_id: &str,
    ids: &[YoutubeId],
    rejected: usize,
) -> StoreResult<BulkIngest> {
    let mut tx = pool.begin().await?;

    let job_id = Uuid::new_v4();
    let accepted = ids.len() as i32;
    let rejected = rejected as i32;

    let job_row = sqlx::query(
        r#"
        INSERT INTO ingestion_jobs (id, list_id, user_id, total, accepted, rejected)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, list_id, user_id, total, accepted, rejected, created_at
        "#,
    )
    .bind(job_id)
    .bind(list_id)
    .bind(user_id)
    .bind(accepted + rejected)
    .bind(accepted)
    .bind(rejected)
    .fetch_one(&mut *tx)
    .await?;

    let mut queued = Vec::with_capacity(ids.len());
    for youtube_id in ids {
        let (video, created) = videos::insert_if_absent(&mut tx, list_id, youtube_id).await?;
        if created {
            enrichments::ensure(&mut tx, video.id).await?;
        }

        // An id already enriched returns immediately; anything else gets a
        // (new) run.
        if !created && video.processing_status == ProcessingStatus::Completed {
            continue;
        }

        let video_job_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO video_jobs (id, job_id, video_id, status, stage)
            VALUES ($1, $2, $3, 'pending', 'created')
            "#,
        )
        .bind(video_job_id)
        .bind(job_id)
        .bind(video.id)
        .execute(&mut *tx)
        .await?;

        queued.push(QueuedVideo {
            video_job_id,
            video_id: video.id,
            youtube_id: youtube_id.clone(),
        });
    }

    tx.commit().await?;

    Ok(BulkIngest {
        job: row_to_job(&job_row),
        queued,
    })
}

/// Fetch a job owned by a user.
pub async fn get(pool: &PgPool, user_id: &str, job_id: Uuid) -> StoreResult<IngestionJob> {
    let row = sqlx::query(
        r#"
        SELECT id, list_id, user_id, total, accepted, rejected, created_at
        FROM ingestion_jobs
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(job_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| or_not_found(e, "job"))?;
    Ok(row_to_job(&row))
}

/// Video ids tracked by a job, for history replay.
pub async fn video_ids(pool: &PgPool, job_id: Uuid) -> StoreResult<Vec<Uuid>> {
    let rows = sqlx::query("SELECT video_id FROM video_jobs WHERE job_id = $1")
        .bind(job_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|row| row.get("video_id")).collect())
}

/// Fetch one video job.
pub async fn get_video_job(pool: &PgPool, video_job_id: Uuid) -> StoreResult<VideoJob> {
    let row = sqlx::query("SELECT * FROM video_jobs WHERE id = $1")
        .bind(video_job_id)
        .fetch_one(pool)
        .await
        .map_err(|e| or_not_found(e, "video job"))?;
    row_to_video_job(&row)
}

/// The most recent video job for a video, if any.
pub async fn latest_for_video(pool: &PgPool, video_id: Uuid) -> StoreResult<Option<VideoJob>> {
    let row = sqlx::query(
        "SELECT * FROM video_jobs WHERE video_id = $1 ORDER BY updated_at DESC LIMIT 1",
    )
    .bind(video_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(row_to_video_job).transpose()
}

/// Record a stage transition.
pub async fn set_stage(
    pool: &PgPool,
    video_job_id: Uuid,
    stage: Stage,
    status: ProcessingStatus,
) -> StoreResult<()> {
    sqlx::query(
        "UPDATE video_jobs SET stage = $2, status = $3, updated_at = now() WHERE id = $1",
    )
    .bind(video_job_id)
    .bind(stage.as_str())
    .bind(status.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// Count one failed attempt and remember its error.
pub async fn record_attempt(
    pool: &PgPool,
    video_job_id: Uuid,
    last_error: &str,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE video_jobs
        SET attempts = attempts + 1, last_error = $2, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(video_job_id)
    .bind(last_error)
    .execute(pool)
    .await?;
    Ok(())
}

/// Reset a failed job for manual retry, rewinding to the earliest failed
/// stage so prior successful artifacts are preserved.
pub async fn reset_for_retry(
    pool: &PgPool,
    video_job_id: Uuid,
    resume_stage: Stage,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE video_jobs
        SET stage = $2, status = 'pending', last_error = NULL, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(video_job_id)
    .bind(resume_stage.as_str())
    .execute(pool)
    .await?;
    Ok(())
}
