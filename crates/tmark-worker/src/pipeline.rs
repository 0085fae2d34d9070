//! Per-video enrichment state machine.
//!
//! `created → metadata → captions → chapters → complete`, with `error` as
//! the terminal fan-in. Metadata failure is fatal for the run; captions and
//! chapters degrade to a partial enrichment instead. Each stage is
//! idempotent: re-entering a stage whose artifacts already exist is a no-op,
//! which makes queue redelivery and manual retry safe.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tracing::{debug, info, warn};

use tmark_models::{EnrichmentStatus, ProcessingStatus, Stage};
use tmark_queue::{EnrichJob, ProgressChannel};
use tmark_store::{enrichments, jobs, videos, StoreError};
use tmark_youtube::{
    extract_chapters, vtt_to_transcript, CaptionClient, SpeechClient, VideosClient,
};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::progress::ProgressReporter;
use crate::retry::RetryConfig;
use crate::throttle::ProgressThrottle;

/// Drives one video through the enrichment stages.
pub struct VideoEnricher {
    pool: PgPool,
    channel: Arc<ProgressChannel>,
    videos_client: Arc<VideosClient>,
    captions_client: Arc<CaptionClient>,
    speech_client: Arc<SpeechClient>,
    config: WorkerConfig,
}

impl VideoEnricher {
    pub fn new(
        pool: PgPool,
        channel: Arc<ProgressChannel>,
        videos_client: Arc<VideosClient>,
        captions_client: Arc<CaptionClient>,
        speech_client: Arc<SpeechClient>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            pool,
            channel,
            videos_client,
            captions_client,
            speech_client,
            config,
        }
    }

    /// Run the pipeline for one job.
    ///
    /// Domain outcomes (completed, partial, failed, canceled) return `Ok` so
    /// the executor acks; only infrastructure errors bubble up for queue
    /// redelivery.
    pub async fn run(&self, job: &EnrichJob) -> WorkerResult<()> {
        let video = match videos::get(&self.pool, job.video_id).await {
            Ok(video) => video,
            Err(StoreError::NotFound { .. }) => {
                info!(video_id = %job.video_id, "Video deleted before enrichment started");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        // A duplicate enqueue for an already-enriched video is a no-op.
        if video.processing_status == ProcessingStatus::Completed {
            debug!(video_id = %job.video_id, "Video already enriched, skipping");
            return Ok(());
        }

        let video_job = jobs::get_video_job(&self.pool, job.video_job_id).await?;
        let mut stage = match video_job.stage {
            Stage::Complete => return Ok(()),
            Stage::Created | Stage::Error => Stage::Metadata,
            resumed => resumed,
        };

        videos::set_status(&self.pool, job.video_id, ProcessingStatus::Processing).await?;
        enrichments::start_run(&self.pool, job.video_id).await?;

        let reporter = ProgressReporter::new(
            Arc::clone(&self.channel),
            &job.user_id,
            job.video_id,
            ProgressThrottle::new(self.config.progress_throttle),
        );

        info!(video_id = %job.video_id, youtube_id = %job.youtube_id, "Enrichment started");

        let mut degraded = false;
        while stage != Stage::Complete {
            match self.ensure_not_canceled(job).await {
                Ok(()) => {}
                Err(e @ WorkerError::Canceled) => {
                    return self.finalize_canceled(job, &reporter, e).await;
                }
                Err(e) => return Err(e),
            }

            jobs::set_stage(&self.pool, job.video_job_id, stage, ProcessingStatus::Processing)
                .await?;
            reporter.stage(stage, Some(stage_message(stage))).await;

            let outcome = match stage {
                Stage::Metadata => self
                    .with_retries(job, self.config.metadata_timeout, || {
                        self.stage_metadata(job)
                    })
                    .await
                    .map(|_| true),
                Stage::Captions => {
                    self.with_retries(job, self.config.captions_timeout, || {
                        self.stage_captions(job, &reporter)
                    })
                    .await
                }
                Stage::Chapters => self
                    .with_retries(job, self.config.chapters_timeout, || {
                        self.stage_chapters(job)
                    })
                    .await,
                // Created/Complete/Error never reach the stage loop body.
                _ => Ok(true),
            };

            match outcome {
                Ok(full) => {
                    if !full {
                        degraded = true;
                    }
                }
                Err(WorkerError::Canceled) => {
                    return self
                        .finalize_canceled(job, &reporter, WorkerError::Canceled)
                        .await;
                }
                Err(e) if stage == Stage::Metadata => {
                    return self.finalize_failed(job, &reporter, e).await;
                }
                Err(e) => {
                    // Non-fatal stage exhausted its retries: degrade instead
                    // of failing the video.
                    warn!(
                        video_id = %job.video_id,
                        stage = %stage,
                        "Stage degraded after retries: {}", e
                    );
                    degraded = true;
                }
            }

            stage = stage.next().unwrap_or(Stage::Complete);
        }

        let status = if degraded {
            EnrichmentStatus::Partial
        } else {
            EnrichmentStatus::Completed
        };
        enrichments::finalize(&self.pool, job.video_id, status, None).await?;
        videos::set_status(&self.pool, job.video_id, ProcessingStatus::Completed).await?;
        jobs::set_stage(
            &self.pool,
            job.video_job_id,
            Stage::Complete,
            ProcessingStatus::Completed,
        )
        .await?;

        reporter
            .stage(Stage::Complete, Some("Enrichment complete"))
            .await;
        metrics::counter!("tmark_enrichments_completed_total").increment(1);

        info!(video_id = %job.video_id, status = %status, "Enrichment finished");
        Ok(())
    }

    /// Fail fast when the video was deleted or flagged for cancellation.
    async fn ensure_not_canceled(&self, job: &EnrichJob) -> WorkerResult<()> {
        if self.channel.is_canceled(job.video_id).await.unwrap_or(false) {
            return Err(WorkerError::Canceled);
        }
        if !videos::exists(&self.pool, job.video_id).await? {
            return Err(WorkerError::Canceled);
        }
        Ok(())
    }

    /// Run one stage body under its wall-clock timeout with the retry
    /// budget. Every failed attempt is recorded on the video job; a timeout
    /// counts as one failed attempt.
    async fn with_retries<T, F, Fut>(
        &self,
        job: &EnrichJob,
        timeout: Duration,
        operation: F,
    ) -> WorkerResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = WorkerResult<T>>,
    {
        let retry = RetryConfig::default().with_max_retries(self.config.stage_retries);
        let mut failures = 0u32;

        loop {
            self.ensure_not_canceled(job).await?;

            let result = match tokio::time::timeout(timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(WorkerError::StageTimeout(timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(WorkerError::Canceled) => return Err(WorkerError::Canceled),
                Err(e) => {
                    failures += 1;
                    jobs::record_attempt(&self.pool, job.video_job_id, &e.to_string())
                        .await
                        .ok();
                    enrichments::increment_retry(&self.pool, job.video_id)
                        .await
                        .ok();

                    if !e.is_retryable() || failures > retry.max_retries {
                        return Err(e);
                    }

                    let delay = retry.delay_for_attempt(failures);
                    debug!(
                        video_id = %job.video_id,
                        attempt = failures,
                        "Stage attempt failed, retrying in {:?}: {}", delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Fetch and store metadata. No-op when the video already carries it.
    async fn stage_metadata(&self, job: &EnrichJob) -> WorkerResult<()> {
        let video = videos::get(&self.pool, job.video_id).await?;
        if video.duration_secs.is_some() {
            return Ok(());
        }

        let metadata = self.videos_client.fetch_metadata(&job.youtube_id).await?;
        videos::apply_metadata(
            &self.pool,
            job.video_id,
            &metadata.title,
            &metadata.channel,
            &metadata.description,
            metadata.thumbnail_url.as_deref(),
            metadata.duration_secs,
            metadata.published_at,
        )
        .await?;
        Ok(())
    }

    /// Fetch captions: manual track, then auto track, then speech-to-text.
    /// Returns `false` when no captions could be produced (downgrades the
    /// run to partial, never fails it).
    async fn stage_captions(
        &self,
        job: &EnrichJob,
        reporter: &ProgressReporter,
    ) -> WorkerResult<bool> {
        let enrichment = enrichments::get(&self.pool, job.video_id).await?;
        if enrichment.captions_vtt.is_some() || enrichment.transcript.is_some() {
            return Ok(true);
        }

        reporter
            .tick(Stage::Captions, 45, Some("Checking caption tracks"))
            .await;

        let tracks = self.captions_client.list_tracks(&job.youtube_id).await?;
        if let Some(track) = self.captions_client.select_track(&tracks) {
            let doc = self
                .captions_client
                .fetch_track(&job.youtube_id, track)
                .await?;
            let transcript = vtt_to_transcript(&doc.vtt);
            enrichments::save_captions(
                &self.pool,
                job.video_id,
                Some(&doc.vtt),
                Some(doc.source),
                (!transcript.is_empty()).then_some(transcript.as_str()),
            )
            .await?;
            return Ok(true);
        }

        reporter
            .tick(
                Stage::Captions,
                60,
                Some("No caption tracks, transcribing audio"),
            )
            .await;

        match self.speech_client.transcribe(&job.youtube_id).await {
            Ok(text) if !text.trim().is_empty() => {
                // Speech-to-text yields plain text only; the VTT column
                // stays empty on purpose.
                enrichments::save_captions(
                    &self.pool,
                    job.video_id,
                    None,
                    Some(tmark_models::CaptionSource::Speech),
                    Some(&text),
                )
                .await?;
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(e) if e.is_retryable() => Err(e.into()),
            Err(e) => {
                warn!(video_id = %job.video_id, "Speech-to-text unavailable: {}", e);
                Ok(false)
            }
        }
    }

    /// Extract chapters from the stored description. An empty chapter list
    /// is a normal outcome.
    async fn stage_chapters(&self, job: &EnrichJob) -> WorkerResult<bool> {
        let enrichment = enrichments::get(&self.pool, job.video_id).await?;
        if !enrichment.chapters.is_empty() {
            return Ok(true);
        }

        let video = videos::get(&self.pool, job.video_id).await?;
        let description = video.description.unwrap_or_default();

        if let Some((chapters, source)) = extract_chapters(&description, video.duration_secs) {
            enrichments::save_chapters(&self.pool, job.video_id, &chapters, Some(source)).await?;
        }
        Ok(true)
    }

    /// Terminal failure: record the sub-reason, mark the video failed, and
    /// emit the error event. Returns `Ok` so the executor acks.
    async fn finalize_failed(
        &self,
        job: &EnrichJob,
        reporter: &ProgressReporter,
        error: WorkerError,
    ) -> WorkerResult<()> {
        let reason = error.failure_reason(true);
        let message = format!("{}: {}", reason.code(), error);
        warn!(video_id = %job.video_id, "Enrichment failed: {}", message);

        enrichments::finalize(
            &self.pool,
            job.video_id,
            EnrichmentStatus::Failed,
            Some(&message),
        )
        .await
        .ok();
        videos::set_status(&self.pool, job.video_id, ProcessingStatus::Failed)
            .await
            .ok();
        jobs::set_stage(
            &self.pool,
            job.video_job_id,
            Stage::Error,
            ProcessingStatus::Failed,
        )
        .await
        .ok();

        reporter.stage(Stage::Error, Some(reason.code())).await;
        metrics::counter!("tmark_enrichments_failed_total").increment(1);
        Ok(())
    }

    /// Cancellation: finalize with `error(canceled)` and stop writing. The
    /// rows may already be gone, so every write is best-effort.
    async fn finalize_canceled(
        &self,
        job: &EnrichJob,
        reporter: &ProgressReporter,
        error: WorkerError,
    ) -> WorkerResult<()> {
        let reason = error.failure_reason(false);
        info!(video_id = %job.video_id, "Enrichment canceled");

        enrichments::finalize(
            &self.pool,
            job.video_id,
            EnrichmentStatus::Failed,
            Some(reason.code()),
        )
        .await
        .ok();
        videos::set_status(&self.pool, job.video_id, ProcessingStatus::Failed)
            .await
            .ok();
        jobs::set_stage(
            &self.pool,
            job.video_job_id,
            Stage::Error,
            ProcessingStatus::Failed,
        )
        .await
        .ok();

        reporter.stage(Stage::Error, Some(reason.code())).await;
        self.channel.clear_cancel(job.video_id).await.ok();
        Ok(())
    }
}

fn stage_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Created => "Queued",
        Stage::Metadata => "Fetching metadata",
        Stage::Captions => "Fetching captions",
        Stage::Chapters => "Extracting chapters",
        Stage::Complete => "Enrichment complete",
        Stage::Error => "Enrichment failed",
    }
}
