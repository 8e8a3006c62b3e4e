//! History store error types.

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum HistoryError {
    /// the underlying document store failed
    #[error("store error: {0}")]
    Store(#[from] StorageError),

    /// a stored record does not have the expected shape
    #[error("invalid {collection} record {key}: {reason}")]
    InvalidRecord {
        collection: &'static str,
        key: String,
        reason: String,
    },
}

impl HistoryError {
    /// another writer moved the store between read and publish
    pub fn is_conflict(&self) -> bool {
        matches!(self, HistoryError::Store(e) if e.is_conflict())
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(e: serde_json::Error) -> Self {
        HistoryError::Store(StorageError::Serialization(e))
    }
}

impl From<crate::storage::InvalidNameError> for HistoryError {
    fn from(e: crate::storage::InvalidNameError) -> Self {
        HistoryError::Store(StorageError::InvalidName(e))
    }
}

pub type HistoryResult<T> = Result<T, HistoryError>;
