use std::sync::Arc;

use tracing::warn;

use crate::error::GatewayError;
use crate::process::{DisabledGateway, FormatGateway};
use crate::protocol::{FormatRequest, parse_response};

/// Typed front for a [`FormatGateway`].
#[derive(Clone)]
pub struct Formatter {
    gateway: Arc<dyn FormatGateway>,
}

impl Formatter {
    pub fn new(gateway: Arc<dyn FormatGateway>) -> Self {
        Self { gateway }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledGateway))
    }

    pub async fn request(&self, request: &FormatRequest) -> Result<String, GatewayError> {
        let raw = self.gateway.call(&request.to_line()).await?;
        parse_response(&raw)
    }

    /// Formatted text for a chat message, or `text` itself if the
    /// formatter fails or answers with an empty payload.
    pub async fn format_message(&self, author: &str, text: &str, room: &str) -> String {
        let request = FormatRequest::Message {
            author: author.to_string(),
            text: text.to_string(),
            room: room.to_string(),
        };
        match self.request(&request).await {
            Ok(formatted) if !formatted.is_empty() => formatted,
            Ok(_) => text.to_string(),
            Err(GatewayError::Disabled) => text.to_string(),
            Err(e) => {
                warn!("Formatting failed for {}: {}", author, e);
                text.to_string()
            }
        }
    }

    pub async fn welcome(&self) -> Result<String, GatewayError> {
        self.request(&FormatRequest::Welcome).await
    }

    pub async fn status(&self) -> Result<String, GatewayError> {
        self.request(&FormatRequest::Status).await
    }
}
