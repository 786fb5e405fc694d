use chrono::{DateTime, TimeDelta, Utc};
use murmur_types::models::{Session, truncate_chars};
use murmur_types::{DEFAULT_ROOM, MAX_NICKNAME_CHARS, MAX_ROOM_CHARS, SYSTEM_AUTHOR};
use tracing::info;

use crate::error::StoreError;

/// Random bytes behind each bearer token (hex encoded, so twice as many chars).
const TOKEN_BYTES: usize = 16;

/// Opaque handle to a registry slot. Only meaningful while the session it
/// was issued for is still active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(usize);

#[derive(Debug)]
enum Slot {
    Occupied(Session),
    Vacant,
}

/// Fixed-capacity directory of active sessions.
///
/// Slots are never removed, only vacated, and a vacated slot is reused
/// before the arena grows.
pub struct Registry {
    slots: Vec<Slot>,
    capacity: usize,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Register a new session under `nickname` in the default room.
    pub fn create_session(
        &mut self,
        nickname: &str,
        now: DateTime<Utc>,
    ) -> Result<(SessionId, &Session), StoreError> {
        let nickname = normalize_nickname(nickname)?;
        if self.lookup_by_nickname(&nickname).is_some() {
            return Err(StoreError::NicknameTaken(nickname));
        }

        let idx = match self.slots.iter().position(|s| matches!(s, Slot::Vacant)) {
            Some(idx) => idx,
            None if self.slots.len() < self.capacity => {
                self.slots.push(Slot::Vacant);
                self.slots.len() - 1
            }
            None => return Err(StoreError::RegistryFull),
        };

        let token = self.fresh_token();
        self.slots[idx] = Slot::Occupied(Session {
            nickname,
            room: DEFAULT_ROOM.to_string(),
            token,
            last_seen: now,
        });

        let id = SessionId(idx);
        self.get(id).map(|session| (id, session)).ok_or(StoreError::SessionNotFound)
    }

    /// Resolve a bearer token. A hit counts as activity for the timeout sweep.
    pub fn lookup_by_token(&mut self, token: &str, now: DateTime<Utc>) -> Option<SessionId> {
        if token.is_empty() {
            return None;
        }
        self.slots.iter_mut().enumerate().find_map(|(idx, slot)| match slot {
            Slot::Occupied(session) if session.token == token => {
                session.last_seen = now;
                Some(SessionId(idx))
            }
            _ => None,
        })
    }

    /// Case-insensitive nickname lookup. Does not touch liveness.
    pub fn lookup_by_nickname(&self, nickname: &str) -> Option<SessionId> {
        self.slots.iter().enumerate().find_map(|(idx, slot)| match slot {
            Slot::Occupied(session) if session.nickname.eq_ignore_ascii_case(nickname) => {
                Some(SessionId(idx))
            }
            _ => None,
        })
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        match self.slots.get(id.0) {
            Some(Slot::Occupied(session)) => Some(session),
            _ => None,
        }
    }

    fn get_mut(&mut self, id: SessionId) -> Result<&mut Session, StoreError> {
        match self.slots.get_mut(id.0) {
            Some(Slot::Occupied(session)) => Ok(session),
            _ => Err(StoreError::SessionNotFound),
        }
    }

    /// Change a session's nickname. Returns the previous one.
    pub fn rename(&mut self, id: SessionId, new_nickname: &str) -> Result<String, StoreError> {
        let new_nickname = normalize_nickname(new_nickname)?;
        if let Some(holder) = self.lookup_by_nickname(&new_nickname) {
            if holder != id {
                return Err(StoreError::NicknameTaken(new_nickname));
            }
        }

        let session = self.get_mut(id)?;
        Ok(std::mem::replace(&mut session.nickname, new_nickname))
    }

    /// Move a session to another room. Returns `(old_room, new_room)`.
    pub fn change_room(&mut self, id: SessionId, room: &str) -> Result<(String, String), StoreError> {
        let room = truncate_chars(room, MAX_ROOM_CHARS).to_string();
        let session = self.get_mut(id)?;
        let old = std::mem::replace(&mut session.room, room.clone());
        Ok((old, room))
    }

    /// Explicit logout. The slot becomes reusable.
    pub fn disconnect(&mut self, id: SessionId) -> Option<Session> {
        let slot = self.slots.get_mut(id.0)?;
        match std::mem::replace(slot, Slot::Vacant) {
            Slot::Occupied(session) => Some(session),
            Slot::Vacant => None,
        }
    }

    /// Vacate every session idle for longer than `timeout`.
    /// Returns the expired sessions so the caller can announce them.
    pub fn sweep_timeouts(&mut self, now: DateTime<Utc>, timeout: TimeDelta) -> Vec<Session> {
        let mut expired = Vec::new();
        for slot in &mut self.slots {
            let stale = matches!(slot, Slot::Occupied(s) if now - s.last_seen > timeout);
            if stale {
                if let Slot::Occupied(session) = std::mem::replace(slot, Slot::Vacant) {
                    info!("Session timed out: {}", session.nickname);
                    expired.push(session);
                }
            }
        }
        expired
    }

    /// Active sessions in slot order.
    pub fn active(&self) -> impl Iterator<Item = &Session> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied(session) => Some(session),
            Slot::Vacant => None,
        })
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn fresh_token(&self) -> String {
        loop {
            let token = hex::encode(rand::random::<[u8; TOKEN_BYTES]>());
            if self.active().all(|s| s.token != token) {
                return token;
            }
        }
    }
}

/// Trim, truncate and validate a requested nickname.
fn normalize_nickname(raw: &str) -> Result<String, StoreError> {
    let nickname = truncate_chars(raw.trim(), MAX_NICKNAME_CHARS);
    if nickname.is_empty() {
        return Err(StoreError::EmptyNickname);
    }
    // Whisper parsing splits on whitespace and the formatter protocol on '|'
    if nickname
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '|')
        || nickname.eq_ignore_ascii_case(SYSTEM_AUTHOR)
    {
        return Err(StoreError::InvalidNickname(nickname.to_string()));
    }
    Ok(nickname.to_string())
}
