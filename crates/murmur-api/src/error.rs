use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use murmur_store::StoreError;
use murmur_types::api::ErrorResponse;

/// Everything a chat operation can report back to a client.
///
/// Formatter and cipher failures never show up here; they are absorbed by
/// their gateways.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("nick '{0}' already taken")]
    NicknameTaken(String),

    #[error("server full")]
    RegistryFull,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("user '{0}' not found")]
    UserNotFound(String),

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("internal error")]
    Internal,
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UnknownCommand(_) => StatusCode::BAD_REQUEST,
            Self::NicknameTaken(_) => StatusCode::CONFLICT,
            Self::RegistryFull => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::UserNotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ChatError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::EmptyNickname => Self::Validation("nickname required".into()),
            StoreError::InvalidNickname(_) => Self::Validation(e.to_string()),
            StoreError::NicknameTaken(nick) => Self::NicknameTaken(nick),
            StoreError::RegistryFull => Self::RegistryFull,
            StoreError::SessionNotFound => Self::NotAuthenticated,
            StoreError::LockPoisoned => {
                error!("Store lock poisoned");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            ok: false,
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_chat_errors() {
        assert_eq!(
            ChatError::from(StoreError::EmptyNickname),
            ChatError::Validation("nickname required".into())
        );
        assert_eq!(
            ChatError::from(StoreError::NicknameTaken("bob".into())),
            ChatError::NicknameTaken("bob".into())
        );
        assert_eq!(ChatError::from(StoreError::SessionNotFound), ChatError::NotAuthenticated);
        assert_eq!(ChatError::from(StoreError::LockPoisoned), ChatError::Internal);
    }

    #[test]
    fn status_codes() {
        assert_eq!(ChatError::NotAuthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ChatError::UserNotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ChatError::RegistryFull.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ChatError::NicknameTaken("x".into()).status(), StatusCode::CONFLICT);
    }
}
