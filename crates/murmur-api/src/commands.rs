//! Slash-command parsing and the read-only projections behind `users`,
//! `rooms` and `status`.

use murmur_types::models::{Session, truncate_chars};

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Nick(String),
    Join(String),
    Users,
    Rooms,
    Status,
    Quit,
    Unknown(String),
}

/// A command given without its required argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingArgument {
    pub usage: &'static str,
}

impl Command {
    /// Parse `line`. A leading `/` is optional.
    pub fn parse(line: &str) -> Result<Self, MissingArgument> {
        let line = line.trim();
        let line = line.strip_prefix('/').unwrap_or(line);
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "nick" if arg.is_empty() => return Err(MissingArgument { usage: "nick <name>" }),
            "nick" => Self::Nick(arg.to_string()),
            "join" => {
                let room = arg.trim_start_matches('#');
                if room.is_empty() {
                    return Err(MissingArgument { usage: "join <room>" });
                }
                Self::Join(room.to_string())
            }
            "users" => Self::Users,
            "rooms" => Self::Rooms,
            "status" => Self::Status,
            "quit" | "leave" => Self::Quit,
            _ => Self::Unknown(truncate_chars(name, 32).to_string()),
        };
        Ok(command)
    }
}

/// `== Users in #room == a b c`
pub fn render_users<'a>(room: &str, sessions: impl Iterator<Item = &'a Session>) -> String {
    let mut out = format!("== Users in #{} ==", room);
    for session in sessions.filter(|s| s.room == room) {
        out.push(' ');
        out.push_str(&session.nickname);
    }
    out
}

/// `== Active Rooms == #general(2) #lounge(1)`, rooms in first-seen order.
pub fn render_rooms<'a>(sessions: impl Iterator<Item = &'a Session>) -> String {
    let mut rooms: Vec<(&str, usize)> = Vec::new();
    for session in sessions {
        match rooms.iter_mut().find(|(name, _)| *name == session.room) {
            Some((_, count)) => *count += 1,
            None => rooms.push((session.room.as_str(), 1)),
        }
    }

    let mut out = String::from("== Active Rooms ==");
    for (name, count) in rooms {
        out.push_str(&format!(" #{}({})", name, count));
    }
    out
}

/// Figures shown by the `status` command.
pub struct StatusReport<'a> {
    pub online: usize,
    pub stored_events: usize,
    pub cipher: &'a str,
    pub key_id: u32,
    pub formatter: &'a str,
}

pub fn render_status(report: &StatusReport<'_>) -> String {
    format!(
        "== SERVER STATUS == Online: {} | Messages: {} | Encryption: {} (key=0x{:X}) | Formatter: {}",
        report.online, report.stored_events, report.cipher, report.key_id, report.formatter
    )
}
