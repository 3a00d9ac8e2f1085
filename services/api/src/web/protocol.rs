//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server.

use lesson_gen_core::{
    domain::GeneratedLessonRecord,
    tracker::{Notification, TrackerEvent},
};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Submits a topic for lesson generation, as the topic form does.
    Submit { topic: String },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The session's full history, newest first. Sent once on connect.
    History { records: Vec<GeneratedLessonRecord> },

    /// A new pending record was added to the top of the history.
    RecordAdded { record: GeneratedLessonRecord },

    /// A record reached its terminal status.
    RecordUpdated { record: GeneratedLessonRecord },

    /// A user-visible notification (toast).
    Notification { notification: Notification },

    /// Reports a protocol error to the client.
    Error { message: String },
}

impl From<TrackerEvent> for ServerMessage {
    fn from(event: TrackerEvent) -> Self {
        match event {
            TrackerEvent::RecordAdded(record) => ServerMessage::RecordAdded { record },
            TrackerEvent::RecordUpdated(record) => ServerMessage::RecordUpdated { record },
            TrackerEvent::Notification(notification) => {
                ServerMessage::Notification { notification }
            }
        }
    }
}
