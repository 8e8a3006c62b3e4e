//! Metrics assembly error types.
//!
//! Only [`CommitLookupError`] aborts an assembly. The rest describe
//! recoverable failures that degrade the record instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::vcs::{CommitHash, VcsError};

/// a mandatory commit fact could not be read
#[derive(Debug, Error)]
#[error("cannot read {field} of commit {commit}: {source}")]
pub struct CommitLookupError {
    pub commit: CommitHash,
    pub field: &'static str,
    pub source: VcsError,
}

/// values that would break a metrics invariant
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidMetrics {
    #[error("{failed} failed tests out of {total}")]
    FailedExceedsTotal { failed: u64, total: u64 },

    #[error("coverage {0} outside 0..=100")]
    CoverageOutOfRange(f64),
}

/// the test runner could not be run to completion
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("cannot create report file: {0}")]
    ReportPath(std::io::Error),
}

/// the machine-readable report is missing or unusable
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no report written at {0}")]
    Missing(PathBuf),

    #[error("cannot read report: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed report: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("inconsistent report: {0}")]
    Invalid(#[from] InvalidMetrics),
}

impl ReportError {
    /// the runner produced nothing at all
    pub fn is_missing(&self) -> bool {
        matches!(self, ReportError::Missing(_))
    }
}
