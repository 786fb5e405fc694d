use murmur_types::models::{Event, EventKind, Session};

/// Whether `session` may see `event`.
///
/// Whispers reach their author and target wherever they are. Everything
/// else is scoped to the room it was posted in. Evaluated at poll time,
/// against the session's current nickname and room.
pub fn is_visible(session: &Session, event: &Event) -> bool {
    match &event.kind {
        EventKind::Whisper { target } => {
            event.author.eq_ignore_ascii_case(&session.nickname)
                || target.eq_ignore_ascii_case(&session.nickname)
        }
        EventKind::Broadcast | EventKind::System => event.room == session.room,
    }
}
