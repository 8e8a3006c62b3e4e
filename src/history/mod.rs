//! commit history persistence
//!
//! Two record layouts share one [`HistoryStore`] contract:
//!
//! - [`StoreShape::Normalized`]: `developers`, `repositories`, `branches` and
//!   `commits` collections linked by keys. A commit is stored once per
//!   branch it was ingested on.
//! - [`StoreShape::Denormalized`]: `commit_history` keyed by commit hash and
//!   `branch_history` keyed by `(user_id, repo_name, branch_name)`.
//!
//! In both, commit facts (message, url, timestamp, author) are written when
//! the record is created and never again, while measurements are replaced on
//! every ingestion. Branch records keep a set of every ingested commit plus
//! the most recent one. Re-ingesting identical metrics changes nothing.

mod denormalized;
mod error;
mod normalized;
mod records;

use std::fmt;
use std::str::FromStr;

pub use denormalized::DenormalizedHistory;
pub use error::{HistoryError, HistoryResult};
pub use normalized::NormalizedHistory;
pub use records::BranchState;

use crate::metrics::CommitMetrics;
use crate::storage::{GitStore, UpdateOutcome};

/// Branch recorded when none is configured and none can be detected.
pub const DEFAULT_BRANCH: &str = "main";

/// Where an ingested commit belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchContext {
    pub branch: String,
    pub user_id: String,
    pub repo_name: String,
    /// canonical remote URL; empty when the working tree has no remote
    pub repository_url: String,
}

impl BranchContext {
    pub fn new(branch: impl Into<String>, user_id: impl Into<String>, repo_name: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            user_id: user_id.into(),
            repo_name: repo_name.into(),
            repository_url: String::new(),
        }
    }

    pub fn with_repository_url(mut self, url: impl Into<String>) -> Self {
        self.repository_url = url.into();
        self
    }
}

/// Persists commit metrics and answers questions about branches.
pub trait HistoryStore {
    /// Record `metrics` on the branch. Returns what happened to the commit record.
    fn upsert(&self, metrics: &CommitMetrics, context: &BranchContext) -> HistoryResult<UpdateOutcome>;

    /// The branch as stored, if anything was ever ingested on it.
    fn branch_state(&self, context: &BranchContext) -> HistoryResult<Option<BranchState>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreShape {
    #[default]
    Normalized,
    Denormalized,
}

impl StoreShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreShape::Normalized => "normalized",
            StoreShape::Denormalized => "denormalized",
        }
    }

    /// The history adapter for this shape over `store`.
    pub fn open<'a>(&self, store: &'a GitStore) -> Box<dyn HistoryStore + 'a> {
        match self {
            StoreShape::Normalized => Box::new(NormalizedHistory::new(store)),
            StoreShape::Denormalized => Box::new(DenormalizedHistory::new(store)),
        }
    }
}

impl fmt::Display for StoreShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normalized" => Ok(StoreShape::Normalized),
            "denormalized" => Ok(StoreShape::Denormalized),
            other => Err(format!("unknown store shape '{}'", other)),
        }
    }
}
