pub mod chat;
pub mod cleanup;
pub mod commands;
pub mod error;
pub mod routes;

use std::sync::Arc;

pub use chat::{Chat, ChatConfig, Joined};
pub use error::ChatError;

pub type AppState = Arc<Chat>;
