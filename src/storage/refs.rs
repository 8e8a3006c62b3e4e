//! The `main` ref of the store repository.
//!
//! Publishing is a compare-and-swap: the ref only moves when it still points
//! at the commit the writer started from.

use git2::{ErrorCode, Repository};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::CommitId;

pub(crate) const MAIN: &str = "refs/heads/main";

/// Current tip of `main`; `EmptyStore` when the ref does not exist yet.
pub(crate) fn main_tip(repo: &Repository) -> StorageResult<CommitId> {
    let reference = match repo.find_reference(MAIN) {
        Ok(reference) => reference,
        Err(e) if e.code() == ErrorCode::NotFound => return Err(StorageError::EmptyStore),
        Err(e) => return Err(e.into()),
    };
    let commit = reference
        .peel_to_commit()
        .map_err(|_| StorageError::RefNotFound(MAIN.to_string()))?;
    Ok(CommitId::new(commit.id()))
}

/// Point `main` and HEAD at the root commit of a new store.
pub(crate) fn start_main(repo: &Repository, root: CommitId) -> StorageResult<()> {
    repo.reference(MAIN, root.raw(), true, "initialize store")?;
    repo.set_head(MAIN)?;
    Ok(())
}

/// Move `main` from `expected` to `next`, or fail with
/// `ConcurrentModification` if another writer got there first.
pub(crate) fn advance_main(repo: &Repository, expected: CommitId, next: CommitId) -> StorageResult<()> {
    let conflict = || StorageError::ConcurrentModification {
        branch: "main".to_string(),
    };

    if main_tip(repo)? != expected {
        return Err(conflict());
    }

    // git re-checks the old value under its ref lock
    let log_message = format!("publish {}", next.short());
    match repo.reference_matching(MAIN, next.raw(), true, expected.raw(), &log_message) {
        Ok(_) => Ok(()),
        Err(e) if matches!(e.code(), ErrorCode::Modified | ErrorCode::Locked) => Err(conflict()),
        Err(e) => Err(e.into()),
    }
}
