use std::path::PathBuf;

use thiserror::Error;

use crate::storage::types::{CollectionName, DocumentKey, InvalidNameError};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// path holds no git repository
    #[error("store not initialized: {0}")]
    NotInitialized(PathBuf),

    /// the repository exists but `main` was never created
    #[error("store is empty: no commits found")]
    EmptyStore,

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("commit not found: {0}")]
    CommitNotFound(String),

    #[error("document already exists: {collection}/{key}")]
    DocumentAlreadyExists {
        collection: CollectionName,
        key: DocumentKey,
    },

    #[error("unexpected entry type at {path}: expected {expected}, found {found}")]
    UnexpectedEntryType {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("corrupted data at {path}: {reason}")]
    CorruptedData { path: PathBuf, reason: String },

    /// field values that cannot be stored or updated as asked
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// `main` moved between reading the snapshot and publishing
    #[error("concurrent modification: branch {branch} was updated by another writer")]
    ConcurrentModification { branch: String },
}

impl StorageError {
    /// Another writer won; rereading and retrying may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::DocumentAlreadyExists { .. } | StorageError::ConcurrentModification { .. }
        )
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts() {
        let conflict = StorageError::ConcurrentModification {
            branch: "main".to_string(),
        };
        assert!(conflict.is_conflict());
        assert!(!StorageError::EmptyStore.is_conflict());
        assert!(conflict.to_string().contains("main"));
    }
}
