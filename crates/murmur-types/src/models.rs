use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SYSTEM_AUTHOR;

/// What kind of chat occurrence an event records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventKind {
    /// Regular room message
    Broadcast,
    /// Server notice (joins, leaves, renames, timeouts)
    System,
    /// Private message; only author and target ever see it
    Whisper { target: String },
}

/// One stored chat event.
///
/// `text` is the source of truth for delivery. `ciphertext` is a
/// verification copy and is empty when the cipher could not produce one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub kind: EventKind,
    pub author: String,
    pub room: String,
    pub text: String,
    pub ciphertext: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Whisper recipient, `None` for every other kind.
    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Whisper { target } => Some(target),
            _ => None,
        }
    }

    pub fn is_whisper(&self) -> bool {
        matches!(self.kind, EventKind::Whisper { .. })
    }
}

/// An event before the ledger has assigned it an id and ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub kind: EventKind,
    pub author: String,
    pub room: String,
    pub text: String,
}

impl NewEvent {
    pub fn broadcast(author: &str, room: &str, text: &str) -> Self {
        Self {
            kind: EventKind::Broadcast,
            author: author.to_string(),
            room: room.to_string(),
            text: truncate_bytes(text, crate::MAX_MESSAGE_BYTES).to_string(),
        }
    }

    pub fn system(room: &str, text: &str) -> Self {
        Self {
            kind: EventKind::System,
            author: SYSTEM_AUTHOR.to_string(),
            room: room.to_string(),
            text: truncate_bytes(text, crate::MAX_MESSAGE_BYTES).to_string(),
        }
    }

    pub fn whisper(author: &str, room: &str, target: &str, text: &str) -> Self {
        Self {
            kind: EventKind::Whisper {
                target: target.to_string(),
            },
            author: author.to_string(),
            room: room.to_string(),
            text: truncate_bytes(text, crate::MAX_MESSAGE_BYTES).to_string(),
        }
    }
}

/// An active chat participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub nickname: String,
    pub room: String,
    pub token: String,
    pub last_seen: DateTime<Utc>,
}

/// Cut `s` to at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Cut `s` to at most `max` bytes without splitting a character.
pub fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
