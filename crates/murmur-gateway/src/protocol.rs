use crate::error::GatewayError;

/// Tag a successful formatter response starts with.
pub const OK_TAG: &str = "OK|";

/// Requests understood by the formatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatRequest {
    /// Reformat a chat message before it is stored
    Message {
        author: String,
        text: String,
        room: String,
    },
    /// Greeting shown to a user who just joined
    Welcome,
    /// One-line formatter status for the status command
    Status,
}

impl FormatRequest {
    /// Encode as a single request line, without the trailing newline.
    pub fn to_line(&self) -> String {
        match self {
            Self::Message { author, text, room } => format!(
                "FORMAT|{}|{}|{}",
                sanitize(author),
                sanitize(text),
                sanitize(room)
            ),
            Self::Welcome => "MOTD".to_string(),
            Self::Status => "STATUS".to_string(),
        }
    }
}

/// Keep a field on one line and out of the delimiter's way.
fn sanitize(field: &str) -> String {
    field
        .chars()
        .map(|c| if c == '|' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Strip the success tag from a raw response, or report it as a failure.
pub fn parse_response(raw: &str) -> Result<String, GatewayError> {
    let trimmed = raw.trim_end_matches(['\n', '\r', ' ']);
    match trimmed.strip_prefix(OK_TAG) {
        Some(payload) => Ok(payload.to_string()),
        None => Err(GatewayError::Rejected(trimmed.to_string())),
    }
}
