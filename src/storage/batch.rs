//! Multi-document writes published as one store commit.
//!
//! A [`Batch`] reads the tip of `main` plus its own staged writes. When the
//! closure passed to [`GitStore::batch`](crate::storage::GitStore::batch)
//! returns `Ok`, every staged document lands in a single commit; on `Err`
//! nothing is published.

use std::collections::{BTreeMap, BTreeSet};

use git2::Repository;

use crate::storage::blob::{self, Document, Fields};
use crate::storage::commit::{self, Mutation};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::filter::{Filter, Update, UpdateOutcome};
use crate::storage::refs;
use crate::storage::tree::Snapshot;
use crate::storage::types::{CollectionName, CommitId, DocumentKey, GitSignature};

type Slot = (CollectionName, DocumentKey);

struct Staged {
    doc: Document,
    mutation: Mutation,
}

pub struct Batch<'repo> {
    repo: &'repo Repository,
    snapshot: Snapshot<'repo>,
    staged: BTreeMap<Slot, Staged>,
}

impl<'repo> Batch<'repo> {
    pub(crate) fn begin(repo: &'repo Repository, tip: CommitId) -> StorageResult<Self> {
        Ok(Self {
            repo,
            snapshot: Snapshot::at(repo, tip)?,
            staged: BTreeMap::new(),
        })
    }

    fn get(&self, collection: &CollectionName, key: &DocumentKey) -> StorageResult<Option<Document>> {
        if let Some(staged) = self.staged.get(&(collection.clone(), key.clone())) {
            return Ok(Some(staged.doc.clone()));
        }
        match self.snapshot.blob(collection, key)? {
            Some(blob) => Ok(Some(blob::load_document(self.repo, blob, key)?)),
            None => Ok(None),
        }
    }

    fn keys(&self, collection: &CollectionName) -> StorageResult<BTreeSet<DocumentKey>> {
        let mut keys: BTreeSet<DocumentKey> = self.snapshot.keys(collection)?.into_iter().collect();
        keys.extend(
            self.staged
                .keys()
                .filter(|(staged_in, _)| staged_in == collection)
                .map(|(_, key)| key.clone()),
        );
        Ok(keys)
    }

    /// Every document of a collection matching the filter, in key order.
    pub fn find(&self, collection: &CollectionName, filter: &Filter) -> StorageResult<Vec<Document>> {
        // a key-pinned filter reads at most one document
        let keys = match filter.key() {
            Some(key) => BTreeSet::from([key.clone()]),
            None => self.keys(collection)?,
        };

        let mut found = Vec::new();
        for key in keys {
            if let Some(doc) = self.get(collection, &key)? {
                if filter.matches(&doc) {
                    found.push(doc);
                }
            }
        }
        Ok(found)
    }

    pub fn find_one(&self, collection: &CollectionName, filter: &Filter) -> StorageResult<Option<Document>> {
        Ok(self.find(collection, filter)?.into_iter().next())
    }

    pub fn count(&self, collection: &CollectionName) -> StorageResult<usize> {
        Ok(self.keys(collection)?.len())
    }

    /// Stage a new document under a generated key.
    pub fn insert_one(&mut self, collection: &CollectionName, fields: Fields) -> StorageResult<DocumentKey> {
        let doc = Document::new(DocumentKey::generate(), fields);
        if self.get(collection, &doc.key)?.is_some() {
            return Err(StorageError::DocumentAlreadyExists {
                collection: collection.clone(),
                key: doc.key,
            });
        }
        let key = doc.key.clone();
        self.stage(collection, doc, Mutation::Insert);
        Ok(key)
    }

    /// Stage an update of the first document matching the filter.
    ///
    /// With `upsert`, a document is created when nothing matches: it takes the
    /// filter's key (or a generated one) and its equality fields, plus the
    /// update's `set`, `set_on_insert` and `add_to_set` values. Returns `None`
    /// only when nothing matched and `upsert` is false.
    pub fn update_one(
        &mut self,
        collection: &CollectionName,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> StorageResult<Option<UpdateOutcome>> {
        let Some(existing) = self.find_one(collection, filter)? else {
            if !upsert {
                return Ok(None);
            }
            let key = filter.key().cloned().unwrap_or_else(DocumentKey::generate);
            let doc = Document::new(key.clone(), update.build_insert(filter));
            self.stage(collection, doc, Mutation::Insert);
            return Ok(Some(UpdateOutcome {
                key,
                created: true,
                modified: true,
            }));
        };

        let key = existing.key.clone();
        let mut fields = existing.fields.clone();
        let modified = update.apply_to_existing(&mut fields)?;
        if modified {
            match self.staged.get_mut(&(collection.clone(), key.clone())) {
                // already new or revised in this batch
                Some(staged) => staged.doc.fields = fields,
                None => self.stage(collection, existing.revise(fields), Mutation::Update),
            }
        }
        Ok(Some(UpdateOutcome {
            key,
            created: false,
            modified,
        }))
    }

    fn stage(&mut self, collection: &CollectionName, doc: Document, mutation: Mutation) {
        let slot = (collection.clone(), doc.key.clone());
        self.staged.insert(slot, Staged { doc, mutation });
    }

    fn subject(&self) -> String {
        let lines: Vec<String> = self
            .staged
            .iter()
            .map(|((collection, key), staged)| staged.mutation.subject(collection, key))
            .collect();
        match lines.as_slice() {
            [single] => single.clone(),
            _ => format!("[BATCH] {} documents\n\n{}", lines.len(), lines.join("\n")),
        }
    }

    /// Write everything staged as one commit on top of `tip` and move `main`
    /// to it. Nothing staged, nothing published.
    pub(crate) fn publish(self, tip: CommitId, signature: &GitSignature) -> StorageResult<Option<CommitId>> {
        if self.staged.is_empty() {
            return Ok(None);
        }

        let mut writes = Vec::with_capacity(self.staged.len());
        for ((collection, key), staged) in &self.staged {
            writes.push((collection, key, blob::store_document(self.repo, &staged.doc)?));
        }
        let tree = self.snapshot.with_documents(&writes)?;
        let next = commit::write_commit(self.repo, tree, Some(tip), &self.subject(), signature)?;
        refs::advance_main(self.repo, tip, next)?;

        tracing::debug!(
            documents = self.staged.len(),
            commit = %next.short(),
            "published store commit"
        );
        Ok(Some(next))
    }
}
