//! Read-only views of the store tree and document rewrites.
//!
//! The root tree holds one directory per collection and each collection
//! holds `{key}.json` blobs. Collections appear with their first document,
//! so a missing collection reads as empty.

use std::collections::BTreeMap;

use git2::{FileMode, ObjectType, Repository, Tree};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BlobId, CollectionName, CommitId, DocumentKey, TreeId};

/// The store tree as of one commit.
pub struct Snapshot<'repo> {
    repo: &'repo Repository,
    root: Tree<'repo>,
}

impl<'repo> Snapshot<'repo> {
    pub(crate) fn at(repo: &'repo Repository, commit: CommitId) -> StorageResult<Self> {
        let root = repo
            .find_commit(commit.raw())
            .map_err(|_| StorageError::CommitNotFound(commit.to_string()))?
            .tree()?;
        Ok(Self { repo, root })
    }

    /// collections present in this snapshot
    pub fn collections(&self) -> Vec<CollectionName> {
        self.root
            .iter()
            .filter(|entry| entry.kind() == Some(ObjectType::Tree))
            .filter_map(|entry| CollectionName::new(entry.name()?).ok())
            .collect()
    }

    fn collection(&self, collection: &CollectionName) -> StorageResult<Option<Tree<'repo>>> {
        let Some(entry) = self.root.get_name(collection.as_str()) else {
            return Ok(None);
        };
        if entry.kind() != Some(ObjectType::Tree) {
            return Err(StorageError::UnexpectedEntryType {
                path: collection.as_str().into(),
                expected: "tree".to_string(),
                found: format!("{:?}", entry.kind()),
            });
        }
        Ok(Some(self.repo.find_tree(entry.id())?))
    }

    /// keys of every document in a collection, in file-name order
    pub fn keys(&self, collection: &CollectionName) -> StorageResult<Vec<DocumentKey>> {
        let Some(tree) = self.collection(collection)? else {
            return Ok(Vec::new());
        };
        let keys = tree
            .iter()
            .filter(|entry| entry.kind() == Some(ObjectType::Blob))
            .filter_map(|entry| DocumentKey::new(entry.name()?.strip_suffix(".json")?).ok())
            .collect();
        Ok(keys)
    }

    pub fn blob(&self, collection: &CollectionName, key: &DocumentKey) -> StorageResult<Option<BlobId>> {
        let Some(tree) = self.collection(collection)? else {
            return Ok(None);
        };
        let file_name = key.file_name();
        // bound so the entry is dropped before `tree`
        let found = match tree.get_name(&file_name) {
            Some(entry) if entry.kind() == Some(ObjectType::Blob) => Ok(Some(BlobId::new(entry.id()))),
            Some(entry) => Err(StorageError::UnexpectedEntryType {
                path: format!("{}/{}", collection, file_name).into(),
                expected: "blob".to_string(),
                found: format!("{:?}", entry.kind()),
            }),
            None => Ok(None),
        };
        found
    }

    /// A new root tree equal to this one with each blob stored at
    /// `{collection}/{key}.json`. Nothing else is rewritten.
    pub fn with_documents(&self, writes: &[(&CollectionName, &DocumentKey, BlobId)]) -> StorageResult<TreeId> {
        let mut by_collection: BTreeMap<&CollectionName, Vec<(&DocumentKey, BlobId)>> = BTreeMap::new();
        for (collection, key, blob) in writes {
            by_collection.entry(*collection).or_default().push((*key, *blob));
        }

        let mut root = self.repo.treebuilder(Some(&self.root))?;
        for (collection, documents) in by_collection {
            let existing = self.collection(collection)?;
            let mut dir = self.repo.treebuilder(existing.as_ref())?;
            for (key, blob) in documents {
                dir.insert(key.file_name(), blob.raw(), FileMode::Blob.into())?;
            }
            root.insert(collection.as_str(), dir.write()?, FileMode::Tree.into())?;
        }
        Ok(TreeId::new(root.write()?))
    }
}

/// the root tree of a fresh store
pub(crate) fn empty_tree(repo: &Repository) -> StorageResult<TreeId> {
    Ok(TreeId::new(repo.treebuilder(None)?.write()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::commit::write_commit;
    use crate::storage::types::GitSignature;
    use tempfile::TempDir;

    fn setup_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn commit_tree(repo: &Repository, tree: TreeId) -> CommitId {
        write_commit(repo, tree, None, "test", &GitSignature::store()).unwrap()
    }

    #[test]
    fn test_empty_snapshot() {
        let (_dir, repo) = setup_repo();
        let commit = commit_tree(&repo, empty_tree(&repo).unwrap());
        let snapshot = Snapshot::at(&repo, commit).unwrap();

        assert!(snapshot.collections().is_empty());
        let commits = CollectionName::new("commits").unwrap();
        assert!(snapshot.keys(&commits).unwrap().is_empty());
        assert!(snapshot
            .blob(&commits, &DocumentKey::new("x").unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_with_document_creates_collection_lazily() {
        let (_dir, repo) = setup_repo();
        let developers = CollectionName::new("developers").unwrap();
        let blob = BlobId::new(repo.blob(b"{}").unwrap());

        let base = Snapshot::at(&repo, commit_tree(&repo, empty_tree(&repo).unwrap())).unwrap();
        let one = base.with_documents(&[(&developers, &DocumentKey::new("d1").unwrap(), blob)]).unwrap();
        let snapshot = Snapshot::at(&repo, commit_tree(&repo, one)).unwrap();
        let two = snapshot.with_documents(&[(&developers, &DocumentKey::new("d2").unwrap(), blob)]).unwrap();
        let snapshot = Snapshot::at(&repo, commit_tree(&repo, two)).unwrap();

        assert_eq!(snapshot.collections(), vec![developers.clone()]);
        assert_eq!(
            snapshot.keys(&developers).unwrap(),
            vec![DocumentKey::new("d1").unwrap(), DocumentKey::new("d2").unwrap()]
        );
        // the base snapshot is unaffected
        assert!(base.collections().is_empty());
    }

    #[test]
    fn test_other_collections_survive_rewrite() {
        let (_dir, repo) = setup_repo();
        let blob = BlobId::new(repo.blob(b"{}").unwrap());
        let a = CollectionName::new("a").unwrap();
        let b = CollectionName::new("b").unwrap();
        let key = DocumentKey::new("k").unwrap();

        let base = Snapshot::at(&repo, commit_tree(&repo, empty_tree(&repo).unwrap())).unwrap();
        let with_a = Snapshot::at(&repo, commit_tree(&repo, base.with_documents(&[(&a, &key, blob)]).unwrap())).unwrap();
        let with_b = Snapshot::at(&repo, commit_tree(&repo, with_a.with_documents(&[(&b, &key, blob)]).unwrap())).unwrap();

        assert_eq!(with_b.keys(&a).unwrap().len(), 1);
        assert_eq!(with_b.keys(&b).unwrap().len(), 1);
    }

    #[test]
    fn test_one_rewrite_across_collections() {
        let (_dir, repo) = setup_repo();
        let first = BlobId::new(repo.blob(b"{\"n\": 1}").unwrap());
        let second = BlobId::new(repo.blob(b"{\"n\": 2}").unwrap());
        let branches = CollectionName::new("branches").unwrap();
        let commits = CollectionName::new("commits").unwrap();
        let b1 = DocumentKey::new("b1").unwrap();
        let c1 = DocumentKey::new("c1").unwrap();
        let c2 = DocumentKey::new("c2").unwrap();

        let base = Snapshot::at(&repo, commit_tree(&repo, empty_tree(&repo).unwrap())).unwrap();
        let tree = base
            .with_documents(&[(&branches, &b1, first), (&commits, &c1, first), (&commits, &c2, second)])
            .unwrap();
        let snapshot = Snapshot::at(&repo, commit_tree(&repo, tree)).unwrap();

        assert_eq!(snapshot.keys(&commits).unwrap(), vec![c1.clone(), c2.clone()]);
        assert_eq!(snapshot.blob(&branches, &b1).unwrap(), Some(first));
        assert_eq!(snapshot.blob(&commits, &c2).unwrap(), Some(second));
        assert_eq!(snapshot.blob(&branches, &c1).unwrap(), None);
    }

    #[test]
    fn test_blob_where_directory_expected() {
        let (_dir, repo) = setup_repo();
        let blob = repo.blob(b"{}").unwrap();
        let mut root = repo.treebuilder(None).unwrap();
        root.insert("commits", blob, FileMode::Blob.into()).unwrap();
        let tree = TreeId::new(root.write().unwrap());
        let snapshot = Snapshot::at(&repo, commit_tree(&repo, tree)).unwrap();

        let commits = CollectionName::new("commits").unwrap();
        assert!(matches!(
            snapshot.keys(&commits),
            Err(StorageError::UnexpectedEntryType { .. })
        ));
    }
}
