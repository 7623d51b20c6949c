use super::ObjectKey;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: String, key: ObjectKey },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: String, key: ObjectKey },

    /// The stored resource version moved on since the object was read.
    #[error("conflict writing {kind} {key}: {message}")]
    Conflict {
        kind: String,
        key: ObjectKey,
        message: String,
    },

    #[error("kind {0} is not registered in the scheme")]
    UnregisteredKind(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Network, timeout or server-side failure; safe to retry later.
    #[error("store unavailable: {0}")]
    Transient(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}
