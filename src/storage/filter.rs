//! Document filters and update specifications.
//!
//! A [`Filter`] is a conjunction of top-level field equalities, optionally
//! pinned to a document key. An [`Update`] describes how a matched document
//! changes, with the operators of a document database:
//!
//! - `set`: overwrite a field
//! - `set_on_insert`: only written when the update creates the document
//! - `add_to_set`: append to an array field unless the value is already a member

use serde_json::Value;

use crate::storage::blob::{Document, Fields};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::DocumentKey;

/// selects documents by key and/or field equality
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    key: Option<DocumentKey>,
    equals: Fields,
}

impl Filter {
    /// a filter matching every document
    pub fn new() -> Self {
        Self::default()
    }

    /// a filter matching the document with the given key
    pub fn by_key(key: DocumentKey) -> Self {
        Self {
            key: Some(key),
            equals: Fields::new(),
        }
    }

    /// require `field == value`
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.insert(field.into(), value.into());
        self
    }

    /// the key this filter is pinned to, if any
    pub fn key(&self) -> Option<&DocumentKey> {
        self.key.as_ref()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(key) = &self.key {
            if &doc.key != key {
                return false;
            }
        }
        self.equals
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }
}

/// describes the change applied to a matched (or upserted) document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Fields,
    set_on_insert: Fields,
    add_to_set: Fields,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// set every field of a field map
    pub fn set_all(mut self, fields: Fields) -> Self {
        self.set.extend(fields);
        self
    }

    pub fn set_on_insert(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_on_insert.insert(field.into(), value.into());
        self
    }

    pub fn set_all_on_insert(mut self, fields: Fields) -> Self {
        self.set_on_insert.extend(fields);
        self
    }

    pub fn add_to_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_to_set.insert(field.into(), value.into());
        self
    }

    /// apply to an existing document's fields
    ///
    /// returns whether anything changed
    pub(crate) fn apply_to_existing(&self, fields: &mut Fields) -> StorageResult<bool> {
        let mut changed = false;

        for (field, value) in &self.set {
            if fields.get(field) != Some(value) {
                fields.insert(field.clone(), value.clone());
                changed = true;
            }
        }

        for (field, value) in &self.add_to_set {
            match fields.get_mut(field) {
                Some(Value::Array(members)) => {
                    if !members.contains(value) {
                        members.push(value.clone());
                        changed = true;
                    }
                }
                Some(other) => {
                    return Err(StorageError::SchemaViolation(format!(
                        "cannot add to set on non-array field '{}': {}",
                        field, other
                    )));
                }
                None => {
                    fields.insert(field.clone(), Value::Array(vec![value.clone()]));
                    changed = true;
                }
            }
        }

        Ok(changed)
    }

    /// build the fields of a document created by an upsert
    ///
    /// the filter's equalities seed the document so it matches the filter
    pub(crate) fn build_insert(&self, filter: &Filter) -> Fields {
        let mut fields = filter.equals.clone();
        fields.extend(self.set_on_insert.clone());
        fields.extend(self.set.clone());
        for (field, value) in &self.add_to_set {
            fields.insert(field.clone(), Value::Array(vec![value.clone()]));
        }
        fields
    }
}

/// what an `update_one` call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// key of the matched or created document
    pub key: DocumentKey,
    /// the document did not exist and was created
    pub created: bool,
    /// stored content changed (always true when created)
    pub modified: bool,
}
