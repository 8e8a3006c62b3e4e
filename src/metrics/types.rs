//! The assembled metrics record and its parts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::error::InvalidMetrics;
use crate::vcs::{CommitHash, LineDelta};

/// Overall test verdict for a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conclusion {
    Success,
    Failure,
    /// no tests ran
    Neutral,
}

impl Conclusion {
    /// `neutral` iff no tests ran, else `failure` iff any failed
    pub fn from_counts(test_count: u64, failed_tests: u64) -> Self {
        match (test_count, failed_tests) {
            (0, _) => Conclusion::Neutral,
            (_, 0) => Conclusion::Success,
            _ => Conclusion::Failure,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Conclusion::Success => "success",
            Conclusion::Failure => "failure",
            Conclusion::Neutral => "neutral",
        }
    }
}

/// Line delta of a commit against its first parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub total: u64,
    pub additions: u64,
    pub deletions: u64,
    /// calendar date of the commit timestamp (UTC)
    pub date: NaiveDate,
}

impl DiffStats {
    pub fn new(delta: LineDelta, date: NaiveDate) -> Self {
        Self {
            total: delta.insertions + delta.deletions,
            additions: delta.insertions,
            deletions: delta.deletions,
            date,
        }
    }
}

/// Test counts and statement coverage of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    test_count: u64,
    failed_tests: u64,
    coverage: f64,
}

impl TestOutcome {
    pub fn new(test_count: u64, failed_tests: u64, coverage: f64) -> Result<Self, InvalidMetrics> {
        if failed_tests > test_count {
            return Err(InvalidMetrics::FailedExceedsTotal {
                failed: failed_tests,
                total: test_count,
            });
        }
        if !(0.0..=100.0).contains(&coverage) {
            return Err(InvalidMetrics::CoverageOutOfRange(coverage));
        }
        Ok(Self {
            test_count,
            failed_tests,
            coverage,
        })
    }

    /// nothing ran: zero counts, zero coverage
    pub fn none() -> Self {
        Self {
            test_count: 0,
            failed_tests: 0,
            coverage: 0.0,
        }
    }

    pub fn test_count(&self) -> u64 {
        self.test_count
    }

    pub fn failed_tests(&self) -> u64 {
        self.failed_tests
    }

    pub fn coverage(&self) -> f64 {
        self.coverage
    }

    pub fn conclusion(&self) -> Conclusion {
        Conclusion::from_counts(self.test_count, self.failed_tests)
    }
}

/// Facts read from version control for one commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitFacts {
    pub commit_id: CommitHash,
    pub author: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Metrics of one commit, immutable once assembled.
///
/// Only constructible from validated parts, so the conclusion always agrees
/// with the test counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitMetrics {
    commit_id: CommitHash,
    author: String,
    message: String,
    timestamp: DateTime<Utc>,
    repository_url: String,
    source_url: String,
    diff_stats: DiffStats,
    coverage: f64,
    test_count: u64,
    failed_tests: u64,
    conclusion: Conclusion,
}

impl CommitMetrics {
    /// `repository_url` is the canonical remote URL, empty when unknown
    pub fn new(facts: CommitFacts, repository_url: String, delta: LineDelta, outcome: TestOutcome) -> Self {
        let source_url = if repository_url.is_empty() {
            String::new()
        } else {
            format!("{}/commit/{}", repository_url, facts.commit_id)
        };
        let diff_stats = DiffStats::new(delta, facts.timestamp.date_naive());

        Self {
            commit_id: facts.commit_id,
            author: facts.author,
            message: facts.message,
            timestamp: facts.timestamp,
            repository_url,
            source_url,
            diff_stats,
            coverage: outcome.coverage(),
            test_count: outcome.test_count(),
            failed_tests: outcome.failed_tests(),
            conclusion: outcome.conclusion(),
        }
    }

    pub fn commit_id(&self) -> &CommitHash {
        &self.commit_id
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn diff_stats(&self) -> &DiffStats {
        &self.diff_stats
    }

    pub fn coverage(&self) -> f64 {
        self.coverage
    }

    pub fn test_count(&self) -> u64 {
        self.test_count
    }

    pub fn failed_tests(&self) -> u64 {
        self.failed_tests
    }

    pub fn conclusion(&self) -> Conclusion {
        self.conclusion
    }
}
