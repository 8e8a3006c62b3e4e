//! version-control collaborator
//!
//! The pipeline asks the working tree a handful of questions about one
//! commit. Each question is its own fallible call so callers decide per fact
//! whether a failure aborts the ingestion or only degrades the record.

mod error;
mod git;
mod reference;
mod remote;

use std::path::Path;

use chrono::{DateTime, Utc};

pub use error::{VcsError, VcsResult};
pub use git::{GitWorkingTree, DEFAULT_REMOTE};
pub use reference::{resolve, CommitHash, CommitRef, ReferenceResolutionError, HEAD_MARKER};
pub use remote::{canonical_url, repository_name};

/// Line-level change counts between two commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineDelta {
    pub insertions: u64,
    pub deletions: u64,
}

/// What the pipeline needs to know from version control.
pub trait VersionControl {
    /// root of the working tree
    fn workdir(&self) -> &Path;

    /// the commit HEAD currently points at
    fn resolve_head(&self) -> VcsResult<CommitHash>;

    /// full lowercase hash of an existing commit, however it was abbreviated
    fn resolve_commit(&self, commit: &CommitHash) -> VcsResult<CommitHash>;

    /// full message, surrounding whitespace trimmed
    fn commit_message(&self, commit: &CommitHash) -> VcsResult<String>;

    /// committer timestamp
    fn commit_time(&self, commit: &CommitHash) -> VcsResult<DateTime<Utc>>;

    /// author display name
    fn commit_author(&self, commit: &CommitHash) -> VcsResult<String>;

    /// URL of the configured remote, as written in the git config
    fn remote_url(&self) -> VcsResult<String>;

    /// `None` for a root commit
    fn first_parent(&self, commit: &CommitHash) -> VcsResult<Option<CommitHash>>;

    fn line_delta(&self, from: &CommitHash, to: &CommitHash) -> VcsResult<LineDelta>;

    /// short name of the checked-out branch
    fn current_branch(&self) -> VcsResult<String>;
}
