use thiserror::Error;

use super::kv::KvError;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error(transparent)]
    Backend(#[from] KvError),

    #[error("batch write timed out with {unresolved} unresolved requests")]
    Timeout { unresolved: usize },

    #[error("malformed record: {0}")]
    Record(String),

    #[error("empty key")]
    EmptyKey,
}

impl StorageError {
    pub fn record(err: serde_json::Error) -> Self {
        StorageError::Record(err.to_string())
    }
}
