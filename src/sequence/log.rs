//! The on-disk sequence log and the test-run id allocator.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use ulid::Ulid;

use crate::sequence::error::{SequenceError, SequenceResult};
use crate::vcs::CommitHash;

const COMMIT_ID: &str = "commitId";
const TEST_ID: &str = "testId";
const RECORDED_AT: &str = "recordedAt";

/// Mint a fresh test-run id (lowercase ULID).
pub fn fresh_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Commit,
    TestRun,
}

/// One marker in the log. Fields other than the marker id are kept as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceEntry(Map<String, Value>);

impl SequenceEntry {
    pub fn commit(commit_id: &CommitHash) -> Self {
        Self(Map::new()).with_field(COMMIT_ID, commit_id.as_str())
    }

    pub fn test_run(test_id: impl Into<String>) -> Self {
        let test_id: String = test_id.into();
        Self(Map::new()).with_field(TEST_ID, test_id)
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// anything carrying `commitId` is a commit marker
    pub fn kind(&self) -> EntryKind {
        if self.0.contains_key(COMMIT_ID) {
            EntryKind::Commit
        } else {
            EntryKind::TestRun
        }
    }

    pub fn commit_id(&self) -> Option<&str> {
        self.0.get(COMMIT_ID).and_then(Value::as_str)
    }

    /// the run id, if present and not null; numbers are rendered as text
    pub fn test_id(&self) -> Option<String> {
        match self.0.get(TEST_ID)? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }
}

/// An ordered, append-only JSON array of markers.
#[derive(Debug, Clone)]
pub struct SequenceLog {
    path: PathBuf,
}

impl SequenceLog {
    /// Open the log at `path`, creating it as `[]` when absent.
    pub fn open(path: impl AsRef<Path>) -> SequenceResult<Self> {
        let log = Self {
            path: path.as_ref().to_path_buf(),
        };
        if !log.path.exists() {
            log.write(&[])?;
            debug!(path = %log.path.display(), "created sequence log");
        }
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> SequenceResult<Vec<SequenceEntry>> {
        let raw = fs::read_to_string(&self.path).map_err(|e| SequenceError::io(&self.path, e))?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|e| SequenceError::malformed(&self.path, e))
    }

    /// Next test-run id. Only the last entry is consulted.
    ///
    /// - commit marker: a fresh id, since a commit starts a new run
    /// - test-run marker: its `testId`, or a fresh id without one
    /// - empty log: a fresh id
    pub fn next_test_run_id(&self) -> SequenceResult<String> {
        let entries = self.entries()?;
        let id = match entries.last() {
            Some(last) if last.kind() == EntryKind::TestRun => last.test_id().unwrap_or_else(fresh_id),
            _ => fresh_id(),
        };
        Ok(id)
    }

    pub fn append(&self, entry: SequenceEntry) -> SequenceResult<()> {
        let mut entries = self.entries()?;
        entries.push(entry);
        self.write(&entries)
    }

    pub fn record_commit(&self, commit: &CommitHash) -> SequenceResult<()> {
        self.append(SequenceEntry::commit(commit))
    }

    pub fn record_test_run(&self, test_id: impl Into<String>) -> SequenceResult<()> {
        let recorded_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.append(SequenceEntry::test_run(test_id).with_field(RECORDED_AT, recorded_at))
    }

    /// replace the file atomically: temp file in the same directory, then rename
    fn write(&self, entries: &[SequenceEntry]) -> SequenceResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let json = serde_json::to_string_pretty(entries).map_err(|e| SequenceError::malformed(&self.path, e))?;

        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| SequenceError::io(&self.path, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| SequenceError::io(&self.path, e))?;
        file.persist(&self.path)
            .map_err(|e| SequenceError::io(&self.path, e.error))?;
        Ok(())
    }
}

/// Next test-run id for the log at `path`, creating the log if needed.
pub fn next_test_run_id(path: impl AsRef<Path>) -> SequenceResult<String> {
    SequenceLog::open(path)?.next_test_run_id()
}
