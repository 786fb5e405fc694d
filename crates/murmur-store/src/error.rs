use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("nickname required")]
    EmptyNickname,

    #[error("invalid nickname '{0}'")]
    InvalidNickname(String),

    #[error("nick '{0}' already taken")]
    NicknameTaken(String),

    #[error("server full")]
    RegistryFull,

    #[error("session not found")]
    SessionNotFound,

    #[error("store lock poisoned")]
    LockPoisoned,
}
