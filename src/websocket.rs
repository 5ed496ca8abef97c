use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::feed::LoadOutcome;

/// Events pushed to connected feed pages via WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    PageLoaded {
        page: u32,
        added: usize,
        total_articles: usize,
    },
    PageFailed {
        page: u32,
        error: String,
    },
    FeedExhausted {
        page: u32,
    },
    FiltersChanged {
        visible: usize,
    },
}

impl FeedEvent {
    /// Event for a finished load, if it changed anything worth announcing.
    pub fn from_outcome(outcome: &LoadOutcome, total_articles: usize) -> Option<Self> {
        match outcome {
            LoadOutcome::Appended { page, added, .. } => Some(FeedEvent::PageLoaded {
                page: *page,
                added: *added,
                total_articles,
            }),
            LoadOutcome::Failed { page, error } => Some(FeedEvent::PageFailed {
                page: *page,
                error: error.clone(),
            }),
            LoadOutcome::Exhausted { page } => Some(FeedEvent::FeedExhausted { page: *page }),
            LoadOutcome::Skipped { .. } | LoadOutcome::Stale { .. } => None,
        }
    }
}

pub type EventSender = broadcast::Sender<FeedEvent>;

/// Create a new broadcast channel for feed events.
pub fn new_event_channel() -> EventSender {
    let (tx, _) = broadcast::channel(64);
    tx
}

/// Axum handler: upgrade HTTP to WebSocket, then forward events.
pub async fn ws_handler(ws: WebSocketUpgrade, State(tx): State<EventSender>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, tx))
}

async fn handle_ws(mut socket: WebSocket, tx: EventSender) {
    let mut rx = tx.subscribe();
    debug!("Feed WebSocket client connected");

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let json = match serde_json::to_string(&ev) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize feed event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Feed WS client lagged, skipped {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            // Read-only stream; client messages are drained and ignored
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
    debug!("Feed WebSocket client disconnected");
}
