//! Identifiers and validated names used by the store.

use std::fmt;

use git2::Oid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! object_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Oid);

        impl $name {
            pub(crate) fn new(oid: Oid) -> Self {
                Self(oid)
            }

            pub(crate) fn raw(&self) -> Oid {
                self.0
            }
        }
    };
}

object_id!(
    /// A commit of the store repository.
    CommitId
);
object_id!(BlobId);
object_id!(TreeId);

impl CommitId {
    /// abbreviated hash for log lines
    pub fn short(&self) -> String {
        let mut hex = self.0.to_string();
        hex.truncate(7);
        hex
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidNameError {
    #[error("name cannot be empty")]
    Empty,
    #[error("name too long: {0} characters")]
    TooLong(usize),
    #[error("name cannot start with '{0}'")]
    InvalidStart(char),
    #[error("invalid character '{char}' at position {position}")]
    InvalidCharacter { char: char, position: usize },
    #[error("'{0}' is a reserved name")]
    Reserved(String),
}

/// names become path components: ASCII alphanumerics, `_` and `-` only
fn check_component(name: &str, max_len: usize) -> Result<(), InvalidNameError> {
    if name.is_empty() {
        return Err(InvalidNameError::Empty);
    }
    if name.len() > max_len {
        return Err(InvalidNameError::TooLong(name.len()));
    }
    match name.char_indices().find(|(_, c)| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-') {
        Some((position, char)) => Err(InvalidNameError::InvalidCharacter { char, position }),
        None => Ok(()),
    }
}

/// A collection: one top-level directory of the store tree.
///
/// At most 64 characters, starting with a letter or `_`. `_meta`, `_system`
/// and `_git` are reserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(String);

impl CollectionName {
    const RESERVED: [&'static str; 3] = ["_meta", "_system", "_git"];

    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        check_component(&name, 64)?;
        if let Some(first) = name.chars().next().filter(|c| !c.is_ascii_alphabetic() && *c != '_') {
            return Err(InvalidNameError::InvalidStart(first));
        }
        if Self::RESERVED.contains(&name.to_ascii_lowercase().as_str()) {
            return Err(InvalidNameError::Reserved(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The `_id` of a document and the stem of its file name.
///
/// Generated keys are lowercase ULIDs; caller-chosen keys such as commit
/// hashes pass the same validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn new(key: impl Into<String>) -> Result<Self, InvalidNameError> {
        let key = key.into();
        check_component(&key, 128)?;
        Ok(Self(key))
    }

    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{key}.json`
    pub(crate) fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

macro_rules! string_newtype_impls {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidNameError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }
    };
}

string_newtype_impls!(CollectionName);
string_newtype_impls!(DocumentKey);

/// Author and committer of store commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSignature {
    pub name: String,
    pub email: String,
}

impl GitSignature {
    pub fn store() -> Self {
        Self {
            name: "commit-metrics".to_string(),
            email: "commit-metrics@localhost".to_string(),
        }
    }

    pub(crate) fn to_git2_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.name, &self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_name_valid() {
        assert!(CollectionName::new("developers").is_ok());
        assert!(CollectionName::new("commit_history").is_ok());
        assert!(CollectionName::new("_private").is_ok());
        assert!(CollectionName::new("my-collection").is_ok());
    }

    #[test]
    fn test_collection_name_invalid() {
        assert_eq!(CollectionName::new(""), Err(InvalidNameError::Empty));
        assert_eq!(
            CollectionName::new("123commits"),
            Err(InvalidNameError::InvalidStart('1'))
        );
        assert_eq!(
            CollectionName::new("commits/x"),
            Err(InvalidNameError::InvalidCharacter { char: '/', position: 7 })
        );
        assert!(matches!(CollectionName::new("_Meta"), Err(InvalidNameError::Reserved(_))));
        assert_eq!(CollectionName::new("a".repeat(65)), Err(InvalidNameError::TooLong(65)));
    }

    #[test]
    fn test_document_key_accepts_hashes_and_ulids() {
        assert!(DocumentKey::new("9fceb02d0ae598e95dc970b74767f19372d61af8").is_ok());
        assert!(DocumentKey::new("01arz3ndektsv4rrffq69g5fav").is_ok());
        assert!(DocumentKey::new("a.b").is_err());
        assert_eq!(DocumentKey::new("abc123").unwrap().file_name(), "abc123.json");
    }

    #[test]
    fn test_document_key_generate() {
        let key1 = DocumentKey::generate();
        let key2 = DocumentKey::generate();
        assert_ne!(key1, key2);
        assert_eq!(key1.as_str().len(), 26);
        assert_eq!(key1.as_str(), key1.as_str().to_lowercase());
    }

    #[test]
    fn test_names_deserialize_with_validation() {
        let key: DocumentKey = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(key.as_str(), "abc");
        assert!(serde_json::from_str::<DocumentKey>("\"a/b\"").is_err());
    }

    #[test]
    fn test_commit_id_short() {
        let id = CommitId::new(Oid::from_str("9fceb02d0ae598e95dc970b74767f19372d61af8").unwrap());
        assert_eq!(id.short(), "9fceb02");
    }
}
