//! Core store handle.
//!
//! Reads see the tip of `main`. Writes are staged in a [`Batch`] and
//! published as one commit on top of it; a batch that changes nothing
//! publishes nothing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::Repository;
use parking_lot::Mutex;

use crate::storage::batch::Batch;
use crate::storage::blob::{Document, Fields};
use crate::storage::commit;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::filter::{Filter, Update, UpdateOutcome};
use crate::storage::refs;
use crate::storage::types::{CollectionName, CommitId, DocumentKey, GitSignature};

/// Handle to a Git-backed document store.
///
/// Clones share one repository handle, released with the last clone.
#[derive(Clone)]
pub struct GitStore {
    shared: Arc<Shared>,
}

struct Shared {
    // git2::Repository is Send but not Sync
    repo: Mutex<Repository>,
    path: PathBuf,
    signature: GitSignature,
}

impl GitStore {
    /// Open an existing store.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        match Repository::open(path) {
            Ok(repo) => Ok(Self::wrap(repo, path)),
            Err(_) => Err(StorageError::NotInitialized(path.to_path_buf())),
        }
    }

    /// Create a store whose `main` holds a single empty commit.
    pub fn init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let store = Self::wrap(Repository::init(path)?, path);
        {
            let repo = store.shared.repo.lock();
            let root = commit::root_commit(&repo, &store.shared.signature)?;
            refs::start_main(&repo, root)?;
        }

        tracing::info!(path = %path.display(), "initialized metrics store");
        Ok(store)
    }

    pub fn open_or_init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if path.join(".git").exists() {
            Self::open(path)
        } else {
            Self::init(path)
        }
    }

    fn wrap(repo: Repository, path: &Path) -> Self {
        Self {
            shared: Arc::new(Shared {
                repo: Mutex::new(repo),
                path: path.to_path_buf(),
                signature: GitSignature::store(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Current tip of the store.
    pub fn head(&self) -> StorageResult<CommitId> {
        refs::main_tip(&self.shared.repo.lock())
    }

    /// Run `f` against the tip of `main` and publish everything it staged as
    /// one commit. When `f` fails nothing is published.
    ///
    /// The store stays locked for the whole call, so a find-or-create inside
    /// `f` is atomic across handles of this process; other processes are
    /// caught by the compare-and-swap on `main`.
    pub fn batch<T, E>(&self, f: impl FnOnce(&mut Batch<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let repo = self.shared.repo.lock();
        let tip = refs::main_tip(&repo)?;
        let mut batch = Batch::begin(&repo, tip)?;
        let value = f(&mut batch)?;
        batch.publish(tip, &self.shared.signature)?;
        Ok(value)
    }

    /// Every document of a collection matching the filter, in key order.
    pub fn find(&self, collection: &CollectionName, filter: &Filter) -> StorageResult<Vec<Document>> {
        self.batch(|batch| batch.find(collection, filter))
    }

    pub fn find_one(&self, collection: &CollectionName, filter: &Filter) -> StorageResult<Option<Document>> {
        self.batch(|batch| batch.find_one(collection, filter))
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &CollectionName) -> StorageResult<usize> {
        self.batch(|batch| batch.count(collection))
    }

    /// Insert a new document under a generated key, as its own commit.
    pub fn insert_one(&self, collection: &CollectionName, fields: Fields) -> StorageResult<DocumentKey> {
        self.batch(|batch| batch.insert_one(collection, fields))
    }

    /// [`Batch::update_one`] as its own commit. An update that changes
    /// nothing publishes nothing.
    pub fn update_one(
        &self,
        collection: &CollectionName,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> StorageResult<Option<UpdateOutcome>> {
        self.batch(|batch| batch.update_one(collection, filter, update, upsert))
    }
}
