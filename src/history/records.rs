//! Field layout of the stored history records.
//!
//! Commit records split into facts, written once when the record is created,
//! and measurements, overwritten on every ingestion. Both shapes follow this
//! split.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::history::error::{HistoryError, HistoryResult};
use crate::metrics::CommitMetrics;
use crate::storage::{CollectionName, Document, Fields, UpdateOutcome};
use crate::vcs::CommitHash;

// normalized shape
pub(crate) const DEVELOPERS: &str = "developers";
pub(crate) const REPOSITORIES: &str = "repositories";
pub(crate) const BRANCHES: &str = "branches";
pub(crate) const COMMITS: &str = "commits";

// denormalized shape
pub(crate) const COMMIT_HISTORY: &str = "commit_history";
pub(crate) const BRANCH_HISTORY: &str = "branch_history";

pub(crate) fn collection(name: &'static str) -> HistoryResult<CollectionName> {
    Ok(CollectionName::new(name)?)
}

pub(crate) fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// message, url and timestamp: never overwritten once stored
pub(crate) fn fact_fields(metrics: &CommitMetrics) -> Fields {
    let mut fields = Fields::new();
    fields.insert("message".into(), metrics.message().into());
    fields.insert("url".into(), metrics.source_url().into());
    fields.insert("timestamp".into(), timestamp_value(metrics.timestamp()));
    fields
}

/// stats, coverage and test results: last write wins
pub(crate) fn measurement_fields(metrics: &CommitMetrics) -> HistoryResult<Fields> {
    let mut fields = Fields::new();
    fields.insert("stats".into(), serde_json::to_value(metrics.diff_stats())?);
    fields.insert("coverage".into(), metrics.coverage().into());
    fields.insert("test_count".into(), metrics.test_count().into());
    fields.insert("failed_tests".into(), metrics.failed_tests().into());
    fields.insert("conclusion".into(), metrics.conclusion().as_str().into());
    Ok(fields)
}

/// `update_one` with `upsert` always yields an outcome
pub(crate) fn upserted(outcome: Option<UpdateOutcome>, collection: &'static str) -> HistoryResult<UpdateOutcome> {
    outcome.ok_or_else(|| HistoryError::InvalidRecord {
        collection,
        key: String::new(),
        reason: "upsert matched nothing and created nothing".into(),
    })
}

/// A branch as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchState {
    #[serde(alias = "branch_name")]
    pub name: String,
    pub last_commit: CommitHash,
    /// every commit ever ingested on this branch, each once
    #[serde(default)]
    pub commit_ids: Vec<CommitHash>,
    pub updated_at: DateTime<Utc>,
}

impl BranchState {
    pub(crate) fn from_document(doc: &Document, collection: &'static str) -> HistoryResult<Self> {
        doc.decode().map_err(|e| HistoryError::InvalidRecord {
            collection,
            key: doc.key.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn contains(&self, commit: &CommitHash) -> bool {
        self.commit_ids.contains(commit)
    }
}
