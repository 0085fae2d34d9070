//! Enrichment worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tmark_queue::{JobQueue, ProgressChannel};
use tmark_worker::{JobExecutor, VideoEnricher, WorkerConfig};
use tmark_youtube::{CaptionClient, SpeechClient, VideosClient};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);
    let env_filter = EnvFilter::from_default_env().add_directive("tmark=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true))
            .with(env_filter)
            .init();
    }

    info!("Starting tmark-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let pool = match tmark_store::connect_from_env().await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to Postgres: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match JobQueue::from_env() {
        Ok(queue) => queue,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let channel = match ProgressChannel::from_env() {
        Ok(channel) => Arc::new(channel),
        Err(e) => {
            error!("Failed to create progress channel: {}", e);
            std::process::exit(1);
        }
    };

    let videos_client = match VideosClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create videos client: {}", e);
            std::process::exit(1);
        }
    };
    let captions_client = match CaptionClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create caption client: {}", e);
            std::process::exit(1);
        }
    };
    let speech_client = match SpeechClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create speech client: {}", e);
            std::process::exit(1);
        }
    };

    let enricher = VideoEnricher::new(
        pool,
        channel,
        videos_client,
        captions_client,
        speech_client,
        config.clone(),
    );
    let executor = Arc::new(JobExecutor::new(config, queue, enricher));

    let shutdown_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
