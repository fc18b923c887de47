use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),

    #[error("failed to persist preferences to {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize preferences: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Degraded-read notice attached to a profile read. The read itself still
/// succeeds with whatever could be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreWarning {
    /// The whole preference document could not be parsed; every profile
    /// reads as empty until the next successful save.
    CorruptDocument { path: String, reason: String },
    /// The preference document exists but could not be read.
    Unreadable { path: String, reason: String },
    /// One user's entry could not be parsed; that user reads as empty.
    CorruptEntry { user_id: String, reason: String },
}

impl std::fmt::Display for StoreWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreWarning::CorruptDocument { path, reason } => {
                write!(f, "preference document {path} is corrupt: {reason}")
            }
            StoreWarning::Unreadable { path, reason } => {
                write!(f, "preference document {path} is unreadable: {reason}")
            }
            StoreWarning::CorruptEntry { user_id, reason } => {
                write!(f, "preferences for '{user_id}' are corrupt: {reason}")
            }
        }
    }
}
