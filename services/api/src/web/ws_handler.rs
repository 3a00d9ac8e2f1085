//! services/api/src/web/ws_handler.rs
//!
//! The WebSocket entry point. It pushes the session's tracker events to the
//! browser so the history re-renders as records resolve, and accepts topic
//! submissions from the client.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::{AppState, SessionId},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use lesson_gen_core::tracker::{LessonTracker, Notification};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
) -> Response {
    let tracker = app_state.tracker_for(session).await;
    ws.on_upgrade(move |socket| handle_socket(socket, tracker, session))
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}

async fn handle_socket(socket: WebSocket, tracker: LessonTracker, session: SessionId) {
    info!(session_id = %session.0, "New WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();

    // Subscribe before taking the snapshot so no update falls in between.
    let mut events = tracker.subscribe();
    let snapshot = ServerMessage::History {
        records: tracker.history().await,
    };
    if send_message(&mut sender, &snapshot).await.is_err() {
        warn!("Failed to send history snapshot. Closing connection.");
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_message(&mut sender, &ServerMessage::from(event)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Client fell behind; resending history");
                    let snapshot = ServerMessage::History {
                        records: tracker.history().await,
                    };
                    if send_message(&mut sender, &snapshot).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Submit { topic }) => {
                        // A rejection goes to this socket only; it is not queued for the page.
                        if let Err(e) = tracker.try_submit(&topic).await {
                            debug!(error = %e, "Submission over WebSocket rejected");
                            let rejected = ServerMessage::Notification {
                                notification: Notification::missing_topic(),
                            };
                            if send_message(&mut sender, &rejected).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        let error = ServerMessage::Error {
                            message: format!("Invalid message: {}", e),
                        };
                        if send_message(&mut sender, &error).await.is_err() {
                            break;
                        }
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {:?}", e);
                    break;
                }
            },
        }
    }

    info!(session_id = %session.0, "WebSocket connection closed");
}
