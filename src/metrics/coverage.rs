//! Reading the test runner's JSON report.
//!
//! The report follows the jest `--json` layout: top-level test counts plus a
//! coverage map keyed by file, where each file carries a statement map `s`
//! of statement id to hit count.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::metrics::error::ReportError;
use crate::metrics::types::TestOutcome;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    #[serde(default)]
    num_total_tests: Option<u64>,
    #[serde(default)]
    num_failed_tests: Option<u64>,
    #[serde(default)]
    coverage_map: Option<BTreeMap<String, FileCoverage>>,
}

#[derive(Debug, Default, Deserialize)]
struct FileCoverage {
    #[serde(default)]
    s: BTreeMap<String, u64>,
}

/// Statement counts summed over every file in a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementTally {
    pub covered: u64,
    pub total: u64,
}

impl StatementTally {
    /// `covered / total` as a percentage rounded to two decimals; 0 when empty
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let ratio = self.covered as f64 / self.total as f64;
        (ratio * 10_000.0).round() / 100.0
    }
}

impl TestReport {
    /// Read a report file. A file that is absent or empty counts as missing.
    pub fn read(path: &Path) -> Result<Self, ReportError> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ReportError::Missing(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(ReportError::Missing(path.to_path_buf()));
        }
        Self::parse(&raw)
    }

    pub fn parse(raw: &[u8]) -> Result<Self, ReportError> {
        Ok(serde_json::from_slice(raw)?)
    }

    pub fn statements(&self) -> StatementTally {
        let mut tally = StatementTally::default();
        for file in self.coverage_map.iter().flat_map(|map| map.values()) {
            tally.total += file.s.len() as u64;
            tally.covered += file.s.values().filter(|hits| **hits > 0).count() as u64;
        }
        tally
    }

    pub fn outcome(&self) -> Result<TestOutcome, ReportError> {
        let outcome = TestOutcome::new(
            self.num_total_tests.unwrap_or(0),
            self.num_failed_tests.unwrap_or(0),
            self.statements().percent(),
        )?;
        Ok(outcome)
    }
}
