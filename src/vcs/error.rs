//! Version-control error types.

use std::path::PathBuf;

use thiserror::Error;

/// errors raised by a version-control collaborator
#[derive(Debug, Error)]
pub enum VcsError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// no working tree was found at or above the path
    #[error("not a git working tree: {0}")]
    NotAWorkingTree(PathBuf),

    /// the commit could not be found
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// the commit exists but a field could not be read from it
    #[error("commit {commit} has no readable {field}")]
    MissingField { commit: String, field: &'static str },

    /// the remote is not configured or has no URL
    #[error("remote '{0}' is not configured")]
    MissingRemote(String),

    /// HEAD does not point at a branch
    #[error("HEAD is detached")]
    DetachedHead,

    /// HEAD points at a branch with no commits
    #[error("repository has no commits yet")]
    UnbornHead,

    /// a string that is neither the symbolic marker nor a commit hash
    #[error("invalid commit reference: '{0}'")]
    InvalidReference(String),
}

/// result type alias for version-control operations
pub type VcsResult<T> = Result<T, VcsError>;
