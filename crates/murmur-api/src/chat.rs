use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use murmur_gateway::Formatter;
use murmur_store::{SessionId, State, Store, verify_events};
use murmur_store::visibility::is_visible;
use murmur_types::models::{Event, NewEvent, Session, truncate_bytes, truncate_chars};
use murmur_types::{MAX_MESSAGE_BYTES, MAX_NICKNAME_CHARS, POLL_LIMIT};

use crate::commands::{self, Command, StatusReport};
use crate::error::ChatError;

/// Greeting used when the formatter cannot supply one.
pub const DEFAULT_GREETING: &str = "Welcome to murmur. Type /w <nick> <text> to whisper.";

pub struct ChatConfig {
    pub greeting: String,
    pub session_timeout: TimeDelta,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            session_timeout: TimeDelta::seconds(120),
        }
    }
}

/// What a successful join hands back to the client.
#[derive(Debug, Clone)]
pub struct Joined {
    pub token: String,
    pub greeting: String,
    pub room: String,
}

/// Chat operations over the shared store and the two gateways.
///
/// The store lock is only ever held for one synchronous step. Formatter
/// calls are awaited with the lock released.
pub struct Chat {
    store: Store,
    formatter: Formatter,
    config: ChatConfig,
}

impl Chat {
    pub fn new(store: Store, formatter: Formatter, config: ChatConfig) -> Self {
        Self {
            store,
            formatter,
            config,
        }
    }

    /// Register `nickname` and announce it in the default room.
    ///
    /// The greeting is fetched before anything is registered, so a join
    /// abandoned while the formatter runs leaves no session behind. The
    /// session and its "joined" notice are then applied in one step.
    pub async fn join(&self, nickname: &str) -> Result<Joined, ChatError> {
        let greeting = match self.formatter.welcome().await {
            Ok(greeting) if !greeting.is_empty() => greeting,
            Ok(_) => self.config.greeting.clone(),
            Err(e) => {
                debug!("No greeting from formatter: {}", e);
                self.config.greeting.clone()
            }
        };

        let now = Utc::now();
        let session = self.store.with_state(|state| {
            let session = state
                .registry
                .create_session(nickname, now)
                .map(|(_, session)| session.clone())?;
            let notice = format!("{} joined #{}", session.nickname, session.room);
            state.ledger.append(NewEvent::system(&session.room, &notice), now);
            Ok::<_, ChatError>(session)
        })?;

        info!("Joined: {}", session.nickname);
        Ok(Joined {
            token: session.token,
            greeting,
            room: session.room,
        })
    }

    /// Post `text` as the session behind `token`. Returns the new event id.
    ///
    /// `/w <target> <body>` is a whisper; anything else goes through the
    /// formatter and is broadcast to the sender's room.
    pub async fn send(&self, token: &str, text: &str) -> Result<u64, ChatError> {
        if text.trim().is_empty() {
            // Still counts as activity for a valid token
            self.authenticate(token)?;
            return Err(ChatError::Validation("empty message".into()));
        }
        let text = truncate_bytes(text, MAX_MESSAGE_BYTES);

        if let Some((target, body)) = parse_whisper(text) {
            return self.with_session(token, |state, _, session| {
                let target_id = state
                    .registry
                    .lookup_by_nickname(target)
                    .ok_or_else(|| ChatError::UserNotFound(target.to_string()))?;
                let target = session_of(state, target_id)?.nickname;
                let event = NewEvent::whisper(&session.nickname, &session.room, &target, body);
                Ok(state.ledger.append(event, Utc::now()))
            });
        }

        let session = self.authenticate(token)?;
        let formatted = self
            .formatter
            .format_message(&session.nickname, text, &session.room)
            .await;

        self.store.with_state(|state| {
            let event = NewEvent::broadcast(&session.nickname, &session.room, &formatted);
            Ok::<_, ChatError>(state.ledger.append(event, Utc::now()))
        })
    }

    pub fn rename(&self, token: &str, new_nickname: &str) -> Result<(), ChatError> {
        self.with_session(token, |state, id, session| {
            let old = state.registry.rename(id, new_nickname)?;
            let new = session_of(state, id)?.nickname;
            let notice = format!("{} is now known as {}", old, new);
            state.ledger.append(NewEvent::system(&session.room, &notice), Utc::now());
            info!("Renamed: {} -> {}", old, new);
            Ok(())
        })
    }

    pub fn change_room(&self, token: &str, room: &str) -> Result<(), ChatError> {
        let room = room.trim();

        self.with_session(token, |state, id, session| {
            if room.is_empty() {
                return Err(ChatError::Validation("room required".into()));
            }
            let now = Utc::now();

            let left = format!("{} left #{}", session.nickname, session.room);
            state.ledger.append(NewEvent::system(&session.room, &left), now);

            let (_, new_room) = state.registry.change_room(id, room)?;

            let joined = format!("{} joined #{}", session.nickname, new_room);
            state.ledger.append(NewEvent::system(&new_room, &joined), now);
            Ok(())
        })
    }

    /// Events visible to the session behind `token` with id above `after_id`.
    pub fn poll(&self, token: &str, after_id: u64, limit: Option<usize>) -> Result<Vec<Event>, ChatError> {
        let limit = limit.unwrap_or(POLL_LIMIT).clamp(1, POLL_LIMIT);

        let (events, cipher) = self.with_session(token, |state, _, session| {
            let events = state
                .ledger
                .query(after_id, limit, |event| is_visible(&session, event));
            Ok((events, state.ledger.cipher().clone()))
        })?;

        // Self-check only; delivery always uses the stored plaintext
        verify_events(&cipher, &events);

        Ok(events)
    }

    /// Run a slash command. Returns text to show the caller, if any.
    pub async fn command(&self, token: &str, line: &str) -> Result<Option<String>, ChatError> {
        let session = self.authenticate(token)?;
        let command = Command::parse(line)
            .map_err(|missing| ChatError::Validation(format!("usage: {}", missing.usage)))?;

        match command {
            Command::Nick(nickname) => self.rename(token, &nickname).map(|_| None),
            Command::Join(room) => self.change_room(token, &room).map(|_| None),
            Command::Users => self.with_session(token, |state, _, session| {
                Ok(Some(commands::render_users(&session.room, state.registry.active())))
            }),
            Command::Rooms => self.store.with_state(|state| {
                Ok::<_, ChatError>(Some(commands::render_rooms(state.registry.active())))
            }),
            Command::Status => {
                let formatter = self
                    .formatter
                    .status()
                    .await
                    .unwrap_or_else(|_| "unavailable".to_string());
                self.store.with_state(|state| {
                    let report = StatusReport {
                        online: state.registry.active_count(),
                        stored_events: state.ledger.len(),
                        cipher: state.ledger.cipher().name(),
                        key_id: state.ledger.cipher().key_id(),
                        formatter: &formatter,
                    };
                    Ok::<_, ChatError>(Some(commands::render_status(&report)))
                })
            }
            Command::Quit => self.leave(token).map(|_| None),
            Command::Unknown(name) => {
                debug!("{} sent unknown command '{}'", session.nickname, name);
                Err(ChatError::UnknownCommand(name))
            }
        }
    }

    /// Explicit logout. Frees the nickname and announces the departure.
    pub fn leave(&self, token: &str) -> Result<(), ChatError> {
        self.with_session(token, |state, id, session| {
            state.registry.disconnect(id);
            let notice = format!("{} left", session.nickname);
            state.ledger.append(NewEvent::system(&session.room, &notice), Utc::now());
            info!("Left: {}", session.nickname);
            Ok(())
        })
    }

    /// Expire idle sessions, posting one "timed out" notice for each into
    /// the room it was last in. Returns how many expired.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<usize, ChatError> {
        let timeout = self.config.session_timeout;
        self.store.with_state(|state| {
            let expired = state.registry.sweep_timeouts(now, timeout);
            for session in &expired {
                let notice = format!("{} timed out", session.nickname);
                state.ledger.append(NewEvent::system(&session.room, &notice), now);
            }
            Ok::<_, ChatError>(expired.len())
        })
    }

    /// Resolve `token` (refreshing its liveness) to a snapshot of its session.
    pub fn authenticate(&self, token: &str) -> Result<Session, ChatError> {
        self.with_session(token, |_, _, session| Ok(session))
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    /// Look up `token` and run `f` under the same lock, so the session
    /// cannot change or vanish between lookup and mutation.
    fn with_session<F, T>(&self, token: &str, f: F) -> Result<T, ChatError>
    where
        F: FnOnce(&mut State, SessionId, Session) -> Result<T, ChatError>,
    {
        let now = Utc::now();
        self.store.with_state(|state| {
            let id = state
                .registry
                .lookup_by_token(token, now)
                .ok_or(ChatError::NotAuthenticated)?;
            let session = session_of(state, id)?;
            f(state, id, session)
        })
    }
}

fn session_of(state: &State, id: SessionId) -> Result<Session, ChatError> {
    state
        .registry
        .get(id)
        .cloned()
        .ok_or(ChatError::NotAuthenticated)
}

/// Split `/w <target> <body>`. The body may be empty; a missing space after
/// the target means the line is not a whisper at all.
fn parse_whisper(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix("/w ")?;
    let (target, body) = rest.split_once(' ')?;
    if target.is_empty() {
        return None;
    }
    Some((truncate_chars(target, MAX_NICKNAME_CHARS), body))
}
