//! Documents and their JSON blob encoding.
//!
//! A document file carries its metadata under `_`-prefixed names next to
//! the fields:
//!
//! ```text
//! {
//!   "_id": "01hx...",
//!   "_version": 1,
//!   "_created_at": "2024-05-01T10:30:00+00:00",
//!   "_updated_at": "2024-05-01T10:30:00+00:00",
//!   "full_name": "Ada Lovelace"
//! }
//! ```

use std::collections::BTreeMap;

use chrono::Utc;
use git2::Repository;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BlobId, DocumentKey};

/// Field map of a document, without metadata. Ordered, so an unchanged
/// document always encodes to the same blob.
pub type Fields = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// file stem of the document
    #[serde(rename = "_id")]
    pub key: DocumentKey,
    /// starts at 1, bumped whenever the fields change
    #[serde(rename = "_version")]
    pub version: u64,
    #[serde(rename = "_created_at")]
    pub created_at: String,
    #[serde(rename = "_updated_at")]
    pub updated_at: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Document {
    pub fn new(key: DocumentKey, fields: Fields) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            key,
            version: 1,
            created_at: now.clone(),
            updated_at: now,
            fields,
        }
    }

    pub fn from_value(key: DocumentKey, value: Value) -> StorageResult<Self> {
        into_fields(value).map(|fields| Self::new(key, fields))
    }

    /// next version of this document holding `fields`
    pub(crate) fn revise(self, fields: Fields) -> Self {
        Self {
            version: self.version + 1,
            updated_at: Utc::now().to_rfc3339(),
            fields,
            ..self
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Deserialize the fields (metadata excluded) into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> StorageResult<T> {
        let object: serde_json::Map<String, Value> = self.fields.clone().into_iter().collect();
        Ok(serde_json::from_value(Value::Object(object))?)
    }
}

/// Fields of a JSON object; anything else is a schema violation.
pub fn into_fields(value: Value) -> StorageResult<Fields> {
    let Value::Object(map) = value else {
        return Err(StorageError::SchemaViolation(format!(
            "document data must be a JSON object, got {}",
            value
        )));
    };
    Ok(map.into_iter().collect())
}

pub(crate) fn store_document(repo: &Repository, doc: &Document) -> StorageResult<BlobId> {
    let bytes = serde_json::to_vec_pretty(doc)?;
    Ok(BlobId::new(repo.blob(&bytes)?))
}

/// Read the document in `blob`, which the tree filed under `key`.
pub(crate) fn load_document(repo: &Repository, blob: BlobId, key: &DocumentKey) -> StorageResult<Document> {
    let blob = repo.find_blob(blob.raw())?;
    parse_document(blob.content(), key)
}

fn parse_document(bytes: &[u8], key: &DocumentKey) -> StorageResult<Document> {
    let doc: Document = serde_json::from_slice(bytes)?;
    if &doc.key != key {
        return Err(StorageError::CorruptedData {
            path: key.file_name().into(),
            reason: format!("file holds document '{}'", doc.key),
        });
    }
    Ok(doc)
}
