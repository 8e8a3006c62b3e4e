//! Commit references and their resolution to immutable identities.
//!
//! A reference is either the symbolic `HEAD` marker or a concrete hash. Only a
//! concrete hash is ever used as a storage key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vcs::error::VcsError;
use crate::vcs::VersionControl;

/// The symbolic marker for the currently checked-out commit.
pub const HEAD_MARKER: &str = "HEAD";

/// A concrete commit hash (abbreviated or full, SHA-1 or SHA-256 length),
/// held in lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitHash(String);

impl CommitHash {
    const MIN_LEN: usize = 4;
    const MAX_LEN: usize = 64;

    pub fn new(hash: impl Into<String>) -> Result<Self, VcsError> {
        let hash = hash.into().to_ascii_lowercase();
        let valid_len = (Self::MIN_LEN..=Self::MAX_LEN).contains(&hash.len());
        if !valid_len || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(VcsError::InvalidReference(hash));
        }
        Ok(Self(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// first seven characters, for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(7)]
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CommitHash {
    type Error = VcsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommitHash> for String {
    fn from(hash: CommitHash) -> Self {
        hash.0
    }
}

/// A commit reference as given by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitRef {
    /// the currently checked-out commit
    Head,
    /// an already concrete hash
    Hash(CommitHash),
}

impl FromStr for CommitRef {
    type Err = VcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == HEAD_MARKER {
            Ok(CommitRef::Head)
        } else {
            CommitHash::new(s).map(CommitRef::Hash)
        }
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitRef::Head => write!(f, "{}", HEAD_MARKER),
            CommitRef::Hash(hash) => write!(f, "{}", hash),
        }
    }
}

/// the symbolic reference could not be turned into a concrete identity
#[derive(Debug, Error)]
#[error("cannot resolve reference '{reference}': {source}")]
pub struct ReferenceResolutionError {
    pub reference: String,
    pub source: VcsError,
}

/// Resolve a reference to the full hash of an existing commit.
///
/// Abbreviated hashes expand to the full one, so every spelling of a commit
/// yields the same storage key. Resolving a resolved hash returns it as is.
pub fn resolve<V>(vcs: &V, reference: &CommitRef) -> Result<CommitHash, ReferenceResolutionError>
where
    V: VersionControl + ?Sized,
{
    let resolved = match reference {
        CommitRef::Hash(hash) => vcs.resolve_commit(hash),
        CommitRef::Head => vcs.resolve_head(),
    };
    resolved.map_err(|source| ReferenceResolutionError {
        reference: reference.to_string(),
        source,
    })
}
