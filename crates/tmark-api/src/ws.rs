//! Live progress transport.
//!
//! Clients connect plain, authenticate with their first frame inside a
//! deadline, and then receive their progress events as they happen. A
//! `history` frame replays the durable ring before live forwarding resumes,
//! so reconnecting clients miss nothing that is still in the ring.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tmark_models::{
    ClientFrame, ProgressEvent, ServerFrame, CLOSE_AUTH_FAILED, CLOSE_AUTH_TIMEOUT,
    CLOSE_BACKPRESSURE,
};
use tmark_store::videos;

use crate::metrics;
use crate::state::AppState;

/// Global counter for active WebSocket connections.
static ACTIVE_WS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

/// Per-connection send buffer; past this high-water mark, intermediate
/// progress is dropped for the slow consumer.
const WS_SEND_BUFFER_SIZE: usize = 64;

/// How long a terminal event may wait on a stalled connection before the
/// connection is closed instead.
const WS_TERMINAL_SEND_TIMEOUT: Duration = Duration::from_secs(5);

const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket endpoint.
pub async fn ws_endpoint(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let count = ACTIVE_WS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_ws_active_connections(count);
    metrics::record_ws_connection();

    ws.on_upgrade(|socket| async move {
        handle_socket(socket, state).await;
        let count = ACTIVE_WS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
    })
}

fn frame_message(frame: &ServerFrame) -> Option<Message> {
    serde_json::to_string(frame).ok().map(Message::Text)
}

/// Queue a frame for sending. Intermediate progress may be dropped when the
/// buffer is full; everything else blocks briefly and reports failure.
async fn send_frame(tx: &mpsc::Sender<Message>, frame: ServerFrame) -> bool {
    let Some(message) = frame_message(&frame) else {
        return true;
    };

    if frame.droppable() {
        match tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Slow consumer: shed the tick, never the terminal event.
                metrics::record_backpressure_drop();
                debug!("Dropped intermediate progress event for slow consumer");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    } else {
        matches!(
            timeout(WS_TERMINAL_SEND_TIMEOUT, tx.send(message)).await,
            Ok(Ok(()))
        )
    }
}

async fn close_with(tx: &mpsc::Sender<Message>, code: u16, reason: &'static str) {
    let _ = tx
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (ws_sender, mut receiver) = socket.split();

    // Bounded channel so a slow consumer backs up here, not in the handler.
    let (tx, rx) = mpsc::channel::<Message>(WS_SEND_BUFFER_SIZE);
    let send_task = tokio::spawn(forward_messages(rx, ws_sender));

    // The first frame must authenticate, within the deadline.
    let user_id = match authenticate(&state, &mut receiver, &tx).await {
        Some(user_id) => user_id,
        None => {
            drop(tx);
            let _ = send_task.await;
            return;
        }
    };

    info!(user_id = %user_id, "WebSocket session started");
    send_frame(&tx, ServerFrame::AuthOk).await;

    let mut live = match state.progress.subscribe(&user_id).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to subscribe to progress: {}", e);
            send_frame(&tx, ServerFrame::error("internal_error", "subscribe failed")).await;
            drop(tx);
            let _ = send_task.await;
            return;
        }
    };

    let mut heartbeat = interval(WS_HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // first tick fires immediately

    loop {
        tokio::select! {
            event = live.next() => {
                match event {
                    Some(event) => {
                        if !send_frame(&tx, ServerFrame::from(&event)).await {
                            // A terminal event could not be delivered.
                            close_with(&tx, CLOSE_BACKPRESSURE, "backpressure").await;
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = heartbeat.tick() => {
                if tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            client_msg = receiver.next() => {
                match client_msg {
                    Some(Ok(Message::Text(text))) => {
                        if !handle_client_frame(&state, &user_id, &tx, &text).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = tx.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(user_id = %user_id, "Client closed connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(user_id = %user_id, "WebSocket receive error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    drop(tx);
    let _ = send_task.await;
    info!(user_id = %user_id, "WebSocket session ended");
}

async fn forward_messages(
    mut rx: mpsc::Receiver<Message>,
    mut ws_sender: SplitSink<WebSocket, Message>,
) {
    while let Some(message) = rx.recv().await {
        let is_close = matches!(message, Message::Close(_));
        if ws_sender.send(message).await.is_err() || is_close {
            break;
        }
    }
}

/// Run the post-connect authentication handshake. Returns the user id, or
/// `None` after closing the socket (4001 on deadline, 4003 on bad token).
async fn authenticate(
    state: &AppState,
    receiver: &mut (impl Stream<Item = Result<Message, axum::Error>> + Unpin),
    tx: &mpsc::Sender<Message>,
) -> Option<String> {
    let first = timeout(state.config.ws_auth_timeout, receiver.next()).await;

    let frame = match first {
        Err(_) => {
            debug!("WebSocket auth deadline exceeded");
            close_with(tx, CLOSE_AUTH_TIMEOUT, "auth timeout").await;
            return None;
        }
        Ok(Some(Ok(Message::Text(text)))) => serde_json::from_str::<ClientFrame>(&text).ok(),
        Ok(_) => None,
    };

    let token = match frame {
        Some(ClientFrame::Auth { token }) => token,
        _ => {
            send_frame(tx, ServerFrame::AuthFailed).await;
            close_with(tx, CLOSE_AUTH_FAILED, "auth failed").await;
            return None;
        }
    };

    match state.verifier.verify(&token) {
        Ok(claims) => Some(claims.sub),
        Err(_) => {
            send_frame(tx, ServerFrame::AuthFailed).await;
            close_with(tx, CLOSE_AUTH_FAILED, "auth failed").await;
            None
        }
    }
}

/// Handle a post-auth client frame. Returns `false` to end the session.
async fn handle_client_frame(
    state: &AppState,
    user_id: &str,
    tx: &mpsc::Sender<Message>,
    text: &str,
) -> bool {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Ping) => send_frame(tx, ServerFrame::Pong).await,
        Ok(ClientFrame::History { since, video_ids }) => {
            replay_history(state, user_id, tx, since, video_ids).await
        }
        Ok(ClientFrame::Auth { .. }) => {
            // Already authenticated; ignore.
            true
        }
        Err(e) => {
            send_frame(
                tx,
                ServerFrame::error("validation_error", format!("invalid frame: {e}")),
            )
            .await
        }
    }
}

/// Stream matching history events in timestamp order, then let the caller
/// resume live forwarding. Replay is at-least-once; clients dedupe by
/// `(video_id, timestamp)`.
async fn replay_history(
    state: &AppState,
    user_id: &str,
    tx: &mpsc::Sender<Message>,
    since: i64,
    video_ids: Option<Vec<Uuid>>,
) -> bool {
    let ids = match video_ids {
        Some(ids) => ids,
        None => match videos::ids_for_user(&state.pool, user_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("History replay failed to list videos: {}", e);
                return send_frame(tx, ServerFrame::error("internal_error", "replay failed"))
                    .await;
            }
        },
    };

    let mut events: Vec<ProgressEvent> = Vec::new();
    for video_id in ids {
        match state.progress.history_since(video_id, since).await {
            Ok(batch) => events.extend(batch),
            Err(e) => {
                warn!(video_id = %video_id, "History read failed: {}", e);
            }
        }
    }
    events.sort_by_key(|e| e.timestamp_ms);

    debug!(user_id = %user_id, count = events.len(), "Replaying history");
    for event in &events {
        // Replayed events bypass the droppable path so the ring is
        // delivered completely.
        let Some(message) = frame_message(&ServerFrame::from(event)) else {
            continue;
        };
        if tx.send(message).await.is_err() {
            return false;
        }
    }
    true
}
