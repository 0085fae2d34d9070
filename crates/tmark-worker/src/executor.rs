//! Job executor: bounded-concurrency consumption of the enrichment queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tmark_queue::{EnrichJob, JobQueue};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::VideoEnricher;

/// How often the pending-claim sweep runs.
const CLAIM_INTERVAL: Duration = Duration::from_secs(60);

/// Consumes jobs from the queue and runs them under a semaphore cap.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    enricher: Arc<VideoEnricher>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    /// Create a new executor.
    pub fn new(config: WorkerConfig, queue: JobQueue, enricher: VideoEnricher) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            enricher: Arc::new(enricher),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Run until shutdown is signaled.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.queue.init().await?;

        // Periodically reclaim jobs whose worker died mid-run.
        let claim_queue = Arc::clone(&self.queue);
        let claim_enricher = Arc::clone(&self.enricher);
        let claim_semaphore = Arc::clone(&self.job_semaphore);
        let claim_consumer = self.consumer_name.clone();
        let mut claim_shutdown = self.shutdown.subscribe();

        let claim_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLAIM_INTERVAL);
            loop {
                tokio::select! {
                    _ = claim_shutdown.changed() => {
                        if *claim_shutdown.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match claim_queue.claim_pending(&claim_consumer, 5).await {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!("Claimed {} pending jobs", jobs.len());
                                for (message_id, job) in jobs {
                                    let Ok(permit) =
                                        claim_semaphore.clone().acquire_owned().await
                                    else {
                                        return;
                                    };
                                    let queue = Arc::clone(&claim_queue);
                                    let enricher = Arc::clone(&claim_enricher);
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_job(enricher, queue, message_id, job).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Failed to claim pending jobs: {}", e),
                        }
                    }
                }
            }
        });

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        let _ = tokio::time::timeout(Duration::from_secs(60), self.wait_for_jobs()).await;

        info!("Executor stopped");
        Ok(())
    }

    /// Pull up to the free slots from the queue and spawn them.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", jobs.len());

        for (message_id, job) in jobs {
            let permit = self
                .job_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;
            let queue = Arc::clone(&self.queue);
            let enricher = Arc::clone(&self.enricher);

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(enricher, queue, message_id, job).await;
            });
        }

        Ok(())
    }

    /// Run one job; ack on success, leave for redelivery (or DLQ) on
    /// infrastructure failure.
    async fn execute_job(
        enricher: Arc<VideoEnricher>,
        queue: Arc<JobQueue>,
        message_id: String,
        job: EnrichJob,
    ) {
        metrics::counter!("tmark_jobs_executed_total").increment(1);

        match enricher.run(&job).await {
            Ok(()) => {
                if let Err(e) = queue.ack(&message_id).await {
                    error!(video_id = %job.video_id, "Failed to ack job: {}", e);
                }
                if let Err(e) = queue.clear_dedup(&job).await {
                    warn!(video_id = %job.video_id, "Failed to clear dedup key: {}", e);
                }
            }
            Err(e) => {
                error!(video_id = %job.video_id, "Job hit an infrastructure error: {}", e);

                let redeliveries = queue.increment_redelivery(&message_id).await.unwrap_or(u32::MAX);
                if redeliveries >= queue.max_redeliveries() {
                    warn!(
                        video_id = %job.video_id,
                        "Job exceeded max redeliveries, moving to DLQ"
                    );
                    if let Err(dlq_err) = queue.dlq(&message_id, &job, &e.to_string()).await {
                        error!(video_id = %job.video_id, "Failed to move job to DLQ: {}", dlq_err);
                    }
                    queue.clear_dedup(&job).await.ok();
                }
                // Otherwise the job stays pending and is redelivered after
                // the visibility timeout.
            }
        }
    }

    /// Wait for every permit to come back.
    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
