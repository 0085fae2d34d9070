//! Redis queue and progress transport integration tests.

use uuid::Uuid;

use tmark_models::{ProgressEvent, Stage, YoutubeId};
use tmark_queue::{EnrichJob, JobQueue, ProgressChannel};

fn test_job() -> EnrichJob {
    EnrichJob {
        job_id: Uuid::new_v4(),
        video_job_id: Uuid::new_v4(),
        video_id: Uuid::new_v4(),
        list_id: Uuid::new_v4(),
        user_id: format!("test-user-{}", Uuid::new_v4()),
        youtube_id: YoutubeId::new("dQw4w9WgXcQ").unwrap(),
    }
}

/// Queue round trip: enqueue, consume, ack.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_enqueue_consume_ack() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let job = test_job();
    queue.enqueue(&job).await.expect("Failed to enqueue");

    let consumed = queue
        .consume("test-consumer", 1000, 10)
        .await
        .expect("Failed to consume");
    let (message_id, consumed_job) = consumed
        .iter()
        .find(|(_, j)| j.video_id == job.video_id)
        .expect("Job not consumed");
    assert_eq!(consumed_job.youtube_id, job.youtube_id);

    queue.ack(message_id).await.expect("Failed to ack");
    queue.clear_dedup(&job).await.expect("Failed to clear dedup");
}

/// A second enqueue for the same video is rejected while the first is
/// outstanding.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_duplicate_enqueue_rejected() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let job = test_job();
    queue.enqueue(&job).await.expect("Failed to enqueue");

    let duplicate = queue.enqueue(&job).await;
    assert!(duplicate.is_err());
    assert!(duplicate.unwrap_err().is_duplicate());

    queue.clear_dedup(&job).await.expect("Failed to clear dedup");
}

/// Dual-write: published events land in the history ring and replay in
/// timestamp order, strictly newer than `since`.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_history_replay() {
    dotenvy::dotenv().ok();

    let channel = ProgressChannel::from_env().expect("Failed to create channel");
    let user_id = format!("test-user-{}", Uuid::new_v4());
    let video_id = Uuid::new_v4();

    let mut first = ProgressEvent::new(video_id, Stage::Metadata, 10);
    first.timestamp_ms = 1_000;
    let mut second = ProgressEvent::new(video_id, Stage::Captions, 40);
    second.timestamp_ms = 2_000;
    let mut third = ProgressEvent::new(video_id, Stage::Complete, 100);
    third.timestamp_ms = 3_000;

    for event in [&first, &second, &third] {
        channel.publish(&user_id, event).await.expect("publish failed");
    }

    let replay = channel
        .history_since(video_id, 1_000)
        .await
        .expect("history failed");
    assert_eq!(replay.len(), 2);
    assert_eq!(replay[0].timestamp_ms, 2_000);
    assert_eq!(replay[1].timestamp_ms, 3_000);

    let all = channel.history_since(video_id, 0).await.expect("history failed");
    assert_eq!(all.len(), 3);
}

/// The history ring is capped: old events fall off once the limit is
/// exceeded.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_history_ring_cap() {
    dotenvy::dotenv().ok();

    let channel = ProgressChannel::from_env()
        .expect("Failed to create channel")
        .with_history_limit(10);
    let user_id = format!("test-user-{}", Uuid::new_v4());
    let video_id = Uuid::new_v4();

    for i in 0..25i64 {
        let mut event = ProgressEvent::new(video_id, Stage::Metadata, 10);
        event.timestamp_ms = 1_000 + i;
        channel.publish(&user_id, &event).await.expect("publish failed");
    }

    let all = channel.history_since(video_id, 0).await.expect("history failed");
    assert_eq!(all.len(), 10);
    // The survivors are the newest ten.
    assert_eq!(all[0].timestamp_ms, 1_015);
    assert_eq!(all[9].timestamp_ms, 1_024);
}

/// Cancellation flags round-trip.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_cancel_flags() {
    dotenvy::dotenv().ok();

    let channel = ProgressChannel::from_env().expect("Failed to create channel");
    let video_id = Uuid::new_v4();

    assert!(!channel.is_canceled(video_id).await.unwrap());
    channel.request_cancel(video_id).await.unwrap();
    assert!(channel.is_canceled(video_id).await.unwrap());
    channel.clear_cancel(video_id).await.unwrap();
    assert!(!channel.is_canceled(video_id).await.unwrap());
}

/// Live subscribers receive published events for their user.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_pubsub_delivery() {
    use futures_util::StreamExt;

    dotenvy::dotenv().ok();

    let channel = ProgressChannel::from_env().expect("Failed to create channel");
    let user_id = format!("test-user-{}", Uuid::new_v4());
    let video_id = Uuid::new_v4();

    let mut stream = channel.subscribe(&user_id).await.expect("subscribe failed");

    // Give the subscription a moment to land before publishing.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let event = ProgressEvent::new(video_id, Stage::Metadata, 10);
    channel.publish(&user_id, &event).await.expect("publish failed");

    let received = tokio::time::timeout(std::time::Duration::from_secs(5), stream.next())
        .await
        .expect("timed out waiting for event")
        .expect("stream ended");
    assert_eq!(received.video_id, video_id);
    assert_eq!(received.stage, Stage::Metadata);
}
