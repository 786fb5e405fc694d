use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Event, EventKind};

// -- Join / leave --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinRequest {
    pub nickname: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinResponse {
    pub ok: bool,
    pub token: String,
    pub greeting: String,
    pub room: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogoutRequest {
    pub token: String,
}

// -- Messages --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendRequest {
    pub token: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendResponse {
    pub ok: bool,
    pub id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PollQuery {
    pub token: String,
    /// Last event id the client has already seen.
    #[serde(default)]
    pub after: u64,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PollResponse {
    pub ok: bool,
    pub events: Vec<EventView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Broadcast,
    System,
    Whisper,
}

/// Client-facing rendering of a stored event. Never carries ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventView {
    pub id: u64,
    pub kind: EventType,
    pub author: String,
    pub room: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub text: String,
    /// Wall clock time, `HH:MM:SS` UTC
    pub time: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Event> for EventView {
    fn from(event: &Event) -> Self {
        let kind = match event.kind {
            EventKind::Broadcast => EventType::Broadcast,
            EventKind::System => EventType::System,
            EventKind::Whisper { .. } => EventType::Whisper,
        };
        Self {
            id: event.id,
            kind,
            author: event.author.clone(),
            room: event.room.clone(),
            target: event.target().map(str::to_string),
            text: event.text.clone(),
            time: event.created_at.format("%H:%M:%S").to_string(),
            created_at: event.created_at,
        }
    }
}

// -- Commands --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandRequest {
    pub token: String,
    pub command: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

// -- Generic --

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}
