//! `VersionControl` over a local git working tree.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use git2::{Commit, ErrorCode, Repository};

use crate::vcs::error::{VcsError, VcsResult};
use crate::vcs::reference::CommitHash;
use crate::vcs::{LineDelta, VersionControl};

/// The remote consulted for the repository URL unless configured otherwise.
pub const DEFAULT_REMOTE: &str = "origin";

/// A git working tree opened through libgit2.
pub struct GitWorkingTree {
    repo: Repository,
    workdir: PathBuf,
    remote: String,
}

impl GitWorkingTree {
    /// Open the working tree containing `path` (searching parent directories).
    pub fn open(path: impl AsRef<Path>) -> VcsResult<Self> {
        let path = path.as_ref();
        let repo = Repository::discover(path).map_err(|_| VcsError::NotAWorkingTree(path.to_path_buf()))?;
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| VcsError::NotAWorkingTree(path.to_path_buf()))?;

        Ok(Self {
            repo,
            workdir,
            remote: DEFAULT_REMOTE.to_string(),
        })
    }

    /// Use a different remote for `remote_url`.
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    fn find_commit(&self, commit: &CommitHash) -> VcsResult<Commit<'_>> {
        self.repo
            .revparse_single(commit.as_str())
            .and_then(|object| object.peel_to_commit())
            .map_err(|e| match e.code() {
                ErrorCode::NotFound | ErrorCode::Ambiguous | ErrorCode::InvalidSpec => {
                    VcsError::CommitNotFound(commit.to_string())
                }
                _ => VcsError::Git(e),
            })
    }

    fn hash_of(commit: &Commit<'_>) -> VcsResult<CommitHash> {
        CommitHash::new(commit.id().to_string())
    }
}

impl VersionControl for GitWorkingTree {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn resolve_head(&self) -> VcsResult<CommitHash> {
        let head = self.repo.head().map_err(|e| match e.code() {
            ErrorCode::UnbornBranch | ErrorCode::NotFound => VcsError::UnbornHead,
            _ => VcsError::Git(e),
        })?;
        let commit = head.peel_to_commit()?;
        Self::hash_of(&commit)
    }

    fn resolve_commit(&self, commit: &CommitHash) -> VcsResult<CommitHash> {
        Self::hash_of(&self.find_commit(commit)?)
    }

    fn commit_message(&self, commit: &CommitHash) -> VcsResult<String> {
        let found = self.find_commit(commit)?;
        let message = found.message().ok_or_else(|| VcsError::MissingField {
            commit: commit.to_string(),
            field: "message",
        })?;
        Ok(message.trim().to_string())
    }

    fn commit_time(&self, commit: &CommitHash) -> VcsResult<DateTime<Utc>> {
        let found = self.find_commit(commit)?;
        Utc.timestamp_opt(found.time().seconds(), 0)
            .single()
            .ok_or_else(|| VcsError::MissingField {
                commit: commit.to_string(),
                field: "timestamp",
            })
    }

    fn commit_author(&self, commit: &CommitHash) -> VcsResult<String> {
        let found = self.find_commit(commit)?;
        let author = found.author();
        author
            .name()
            .map(|name| name.trim().to_string())
            .ok_or_else(|| VcsError::MissingField {
                commit: commit.to_string(),
                field: "author",
            })
    }

    fn remote_url(&self) -> VcsResult<String> {
        let remote = self
            .repo
            .find_remote(&self.remote)
            .map_err(|_| VcsError::MissingRemote(self.remote.clone()))?;
        remote
            .url()
            .map(str::to_string)
            .ok_or_else(|| VcsError::MissingRemote(self.remote.clone()))
    }

    fn first_parent(&self, commit: &CommitHash) -> VcsResult<Option<CommitHash>> {
        let found = self.find_commit(commit)?;
        if found.parent_count() == 0 {
            return Ok(None);
        }
        let parent = found.parent(0)?;
        Ok(Some(Self::hash_of(&parent)?))
    }

    fn line_delta(&self, from: &CommitHash, to: &CommitHash) -> VcsResult<LineDelta> {
        let old_tree = self.find_commit(from)?.tree()?;
        let new_tree = self.find_commit(to)?.tree()?;

        let diff = self.repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)?;
        let stats = diff.stats()?;

        Ok(LineDelta {
            insertions: stats.insertions() as u64,
            deletions: stats.deletions() as u64,
        })
    }

    fn current_branch(&self) -> VcsResult<String> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => head
                .shorthand()
                .map(str::to_string)
                .ok_or(VcsError::DetachedHead),
            Ok(_) => Err(VcsError::DetachedHead),
            Err(e) if e.code() == ErrorCode::UnbornBranch => Err(VcsError::UnbornHead),
            Err(e) => Err(VcsError::Git(e)),
        }
    }
}
