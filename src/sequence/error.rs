//! Sequence log error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("cannot access sequence log {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// the log is not a JSON array of objects
    #[error("malformed sequence log {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl SequenceError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        SequenceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(path: &std::path::Path, reason: impl ToString) -> Self {
        SequenceError::Malformed {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

pub type SequenceResult<T> = Result<T, SequenceError>;
