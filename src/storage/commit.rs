//! Store commits.
//!
//! Every published batch is one commit, so the store's git log is an audit
//! trail of its mutations.

use git2::Repository;

use crate::storage::error::StorageResult;
use crate::storage::tree::empty_tree;
use crate::storage::types::{CollectionName, CommitId, DocumentKey, GitSignature, TreeId};

/// What a store commit did to one document; rendered as a commit subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mutation {
    Insert,
    Update,
}

impl Mutation {
    pub(crate) fn subject(self, collection: &CollectionName, key: &DocumentKey) -> String {
        let verb = match self {
            Mutation::Insert => "INSERT",
            Mutation::Update => "UPDATE",
        };
        format!("[{}] {}/{}", verb, collection, key)
    }
}

/// Write a commit object. No ref is moved; publishing is up to the caller.
pub(crate) fn write_commit(
    repo: &Repository,
    tree: TreeId,
    parent: Option<CommitId>,
    message: &str,
    signature: &GitSignature,
) -> StorageResult<CommitId> {
    let tree = repo.find_tree(tree.raw())?;
    let sig = signature.to_git2_signature()?;
    let parent = parent.map(|id| repo.find_commit(id.raw())).transpose()?;
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    let oid = repo.commit(None, &sig, &sig, message, &tree, &parents)?;
    Ok(CommitId::new(oid))
}

/// the parentless commit every store starts from
pub(crate) fn root_commit(repo: &Repository, signature: &GitSignature) -> StorageResult<CommitId> {
    let tree = empty_tree(repo)?;
    write_commit(repo, tree, None, "[store] Initialize metrics history", signature)
}
