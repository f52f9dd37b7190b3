//! Error type shared by every public operation

/// Errors surfaced by the keyboard pipeline
#[derive(Debug, thiserror::Error)]
pub enum KeyboardError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error("unsupported hotkey: {0}")]
    UnsupportedHotkey(String),

    #[error("a recording is already active")]
    AlreadyRecording,

    #[error("no recording is active")]
    NoActiveRecording,

    #[error("unknown handle: {0}")]
    UnknownHandle(u64),

    #[error("key is not registered: {0}")]
    NotRegistered(String),

    #[error("keyboard backend error: {0}")]
    Backend(String),

    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(String),

    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KeyboardError>;
