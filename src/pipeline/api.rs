//! Ingestion configuration and errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::history::{HistoryError, StoreShape};
use crate::metrics::{CommandTestRunner, CommitLookupError, DEFAULT_BUILD_MANIFEST};
use crate::sequence::SequenceError;
use crate::storage::StorageError;
use crate::vcs::{CommitHash, ReferenceResolutionError, VcsError, DEFAULT_REMOTE};

/// Result type for ingestion.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors that abort an ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot open working tree: {0}")]
    WorkingTree(#[source] VcsError),

    #[error("cannot open store at {path}: {source}")]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    ReferenceResolution(#[from] ReferenceResolutionError),

    #[error(transparent)]
    CommitLookup(#[from] CommitLookupError),

    #[error("failed to persist commit {commit}: {source}")]
    StorePersistence {
        commit: CommitHash,
        #[source]
        source: HistoryError,
    },

    /// a store read outside of an ingestion failed
    #[error("store error: {0}")]
    History(#[source] HistoryError),

    #[error("sequence log error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IngestError {
    /// the commit being processed when the error occurred, if known
    pub fn commit(&self) -> Option<&CommitHash> {
        match self {
            IngestError::CommitLookup(e) => Some(&e.commit),
            IngestError::StorePersistence { commit, .. } => Some(commit),
            _ => None,
        }
    }

    /// The store moved under this run; ingestion is idempotent, so a retry
    /// may succeed.
    pub fn is_conflict(&self) -> bool {
        match self {
            IngestError::StorePersistence { source, .. } | IngestError::History(source) => source.is_conflict(),
            _ => false,
        }
    }
}

/// Ingestion configuration options.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Working tree to read commits from.
    pub workdir: PathBuf,
    /// Directory of the metrics store.
    pub store_path: PathBuf,
    /// Create the store if it doesn't exist.
    pub create_if_missing: bool,
    pub shape: StoreShape,
    /// Branch to record under; detected from the working tree when unset.
    pub branch: Option<String>,
    pub user_id: String,
    /// Repository name; derived from the remote URL when unset.
    pub repo_name: Option<String>,
    pub remote: String,
    /// File whose presence enables the test run.
    pub build_manifest: String,
    pub test_command: CommandTestRunner,
    /// Append a commit marker here after each successful ingestion.
    pub sequence_log: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            store_path: PathBuf::from(".commit-metrics"),
            create_if_missing: true,
            shape: StoreShape::default(),
            branch: None,
            user_id: "anonymous".to_string(),
            repo_name: None,
            remote: DEFAULT_REMOTE.to_string(),
            build_manifest: DEFAULT_BUILD_MANIFEST.to_string(),
            test_command: CommandTestRunner::jest(),
            sequence_log: None,
        }
    }
}

impl IngestConfig {
    /// Create a configuration for the working tree at `workdir`.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            ..Default::default()
        }
    }

    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn shape(mut self, shape: StoreShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn repo_name(mut self, name: impl Into<String>) -> Self {
        self.repo_name = Some(name.into());
        self
    }

    pub fn remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn build_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.build_manifest = manifest.into();
        self
    }

    pub fn test_command(mut self, command: CommandTestRunner) -> Self {
        self.test_command = command;
        self
    }

    pub fn sequence_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.sequence_log = Some(path.into());
        self
    }

    /// reject values that can never work
    pub fn validate(&self) -> IngestResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(IngestError::InvalidConfig("user id must not be empty".into()));
        }
        if self.remote.trim().is_empty() {
            return Err(IngestError::InvalidConfig("remote name must not be empty".into()));
        }
        if self.build_manifest.trim().is_empty() {
            return Err(IngestError::InvalidConfig("build manifest must not be empty".into()));
        }
        if matches!(&self.branch, Some(branch) if branch.trim().is_empty()) {
            return Err(IngestError::InvalidConfig("branch must not be empty".into()));
        }
        Ok(())
    }
}
