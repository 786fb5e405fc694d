pub mod api;
pub mod models;

/// Room every new session starts in.
pub const DEFAULT_ROOM: &str = "general";

/// Author used for notices generated by the server itself.
pub const SYSTEM_AUTHOR: &str = "SYSTEM";

/// Longest nickname kept, in characters. Longer input is truncated.
pub const MAX_NICKNAME_CHARS: usize = 23;

/// Longest room name kept, in characters. Longer input is truncated.
pub const MAX_ROOM_CHARS: usize = 23;

/// Longest message body kept, in bytes.
pub const MAX_MESSAGE_BYTES: usize = 479;

/// Hard upper bound on events returned by a single poll.
pub const POLL_LIMIT: usize = 50;
