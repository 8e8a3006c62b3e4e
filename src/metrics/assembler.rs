//! Building a `CommitMetrics` record for one resolved commit.

use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics::coverage::TestReport;
use crate::metrics::error::CommitLookupError;
use crate::metrics::runner::{ReportArtifact, TestRunner};
use crate::metrics::types::{CommitFacts, CommitMetrics, TestOutcome};
use crate::vcs::{canonical_url, CommitHash, LineDelta, VersionControl};

/// File whose presence means the working tree has a test suite to run.
pub const DEFAULT_BUILD_MANIFEST: &str = "package.json";

/// A recoverable failure absorbed into the record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Degradation {
    #[error("remote URL unavailable: {0}")]
    RemoteUrlUnavailable(String),

    #[error("diff computation failed: {0}")]
    DiffComputationFailure(String),

    #[error("test runner failed: {0}")]
    TestRunnerFailure(String),

    #[error("test report unreadable: {0}")]
    ReportUnreadable(String),
}

#[derive(Debug, Clone)]
pub struct Assembled {
    pub metrics: CommitMetrics,
    pub degradations: Vec<Degradation>,
}

pub struct MetricsAssembler<'a> {
    vcs: &'a dyn VersionControl,
    runner: &'a dyn TestRunner,
    build_manifest: String,
}

impl<'a> MetricsAssembler<'a> {
    pub fn new(vcs: &'a dyn VersionControl, runner: &'a dyn TestRunner) -> Self {
        Self {
            vcs,
            runner,
            build_manifest: DEFAULT_BUILD_MANIFEST.to_string(),
        }
    }

    /// Relative path of the build-declaration file.
    pub fn with_build_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.build_manifest = manifest.into();
        self
    }

    /// Assemble metrics for `commit`.
    ///
    /// Tests run against the working tree as checked out, which is expected
    /// to be `commit`.
    pub fn assemble(&self, commit: &CommitHash) -> Result<Assembled, CommitLookupError> {
        let facts = self.commit_facts(commit)?;
        let mut degradations = Vec::new();

        let repository_url = self.repository_url(&mut degradations);
        let delta = self.line_delta(commit, &mut degradations);
        let outcome = self.test_outcome(&mut degradations);

        let metrics = CommitMetrics::new(facts, repository_url, delta, outcome);
        debug!(
            commit = %commit,
            conclusion = metrics.conclusion().as_str(),
            degraded = degradations.len(),
            "assembled commit metrics"
        );

        Ok(Assembled { metrics, degradations })
    }

    fn commit_facts(&self, commit: &CommitHash) -> Result<CommitFacts, CommitLookupError> {
        let lookup = |field: &'static str| {
            let commit = commit.clone();
            move |source| CommitLookupError { commit, field, source }
        };

        Ok(CommitFacts {
            message: self.vcs.commit_message(commit).map_err(lookup("message"))?,
            timestamp: self.vcs.commit_time(commit).map_err(lookup("timestamp"))?,
            author: self.vcs.commit_author(commit).map_err(lookup("author"))?,
            commit_id: commit.clone(),
        })
    }

    fn repository_url(&self, degradations: &mut Vec<Degradation>) -> String {
        match self.vcs.remote_url() {
            Ok(raw) => canonical_url(&raw),
            Err(err) => {
                warn!(error = %err, "repository URL unavailable, leaving it empty");
                degradations.push(Degradation::RemoteUrlUnavailable(err.to_string()));
                String::new()
            }
        }
    }

    fn line_delta(&self, commit: &CommitHash, degradations: &mut Vec<Degradation>) -> LineDelta {
        let delta = self
            .vcs
            .first_parent(commit)
            .and_then(|parent| match parent {
                Some(parent) => self.vcs.line_delta(&parent, commit),
                None => {
                    debug!(commit = %commit, "root commit, no diff");
                    Ok(LineDelta::default())
                }
            });

        delta.unwrap_or_else(|err| {
            warn!(commit = %commit, error = %err, "diff computation failed, using zeros");
            degradations.push(Degradation::DiffComputationFailure(err.to_string()));
            LineDelta::default()
        })
    }

    fn test_outcome(&self, degradations: &mut Vec<Degradation>) -> TestOutcome {
        let workdir = self.vcs.workdir();
        if !workdir.join(&self.build_manifest).is_file() {
            debug!(manifest = %self.build_manifest, "no build manifest, skipping tests");
            return TestOutcome::none();
        }

        let artifact = match ReportArtifact::create() {
            Ok(artifact) => artifact,
            Err(err) => {
                warn!(error = %err, "cannot allocate a report file, skipping tests");
                degradations.push(Degradation::TestRunnerFailure(err.to_string()));
                return TestOutcome::none();
            }
        };

        if let Err(err) = self.runner.run(workdir, artifact.path()) {
            warn!(error = %err, "test runner failed");
            degradations.push(Degradation::TestRunnerFailure(err.to_string()));
        }

        match TestReport::read(artifact.path()).and_then(|report| report.outcome()) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "test report unreadable, using zero counts");
                degradations.push(Degradation::ReportUnreadable(err.to_string()));
                TestOutcome::none()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};

    use chrono::{DateTime, TimeZone, Utc};
    use parking_lot::Mutex;

    use crate::metrics::error::RunnerError;
    use crate::metrics::types::Conclusion;
    use crate::test_support::ScratchRepo;
    use crate::vcs::{GitWorkingTree, VcsError, VcsResult};

    /// Writes a canned report (or nothing) and remembers where it wrote.
    struct FakeRunner {
        report: Option<&'static str>,
        fail: bool,
        seen: Mutex<Vec<PathBuf>>,
    }

    impl FakeRunner {
        fn new(report: Option<&'static str>, fail: bool) -> Self {
            Self {
                report,
                fail,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl TestRunner for FakeRunner {
        fn run(&self, _workdir: &Path, report_path: &Path) -> Result<(), RunnerError> {
            self.seen.lock().push(report_path.to_path_buf());
            if let Some(report) = self.report {
                fs::write(report_path, report).unwrap();
            }
            if self.fail {
                return Err(RunnerError::ExitStatus {
                    program: "fake".into(),
                    status: "exit status: 1".into(),
                    stderr: String::new(),
                });
            }
            Ok(())
        }
    }

    const HALF_COVERED: &str = r#"{
        "numTotalTests": 4,
        "numFailedTests": 1,
        "coverageMap": {"a.js": {"s": {"0": 1, "1": 0}}}
    }"#;

    /// Version control whose lookups fail on demand.
    struct BrokenVcs {
        workdir: PathBuf,
        fail_author: bool,
        fail_diff: bool,
    }

    impl VersionControl for BrokenVcs {
        fn workdir(&self) -> &Path {
            &self.workdir
        }

        fn resolve_head(&self) -> VcsResult<CommitHash> {
            Err(VcsError::UnbornHead)
        }

        fn resolve_commit(&self, commit: &CommitHash) -> VcsResult<CommitHash> {
            Ok(commit.clone())
        }

        fn commit_message(&self, _: &CommitHash) -> VcsResult<String> {
            Ok("msg".into())
        }

        fn commit_time(&self, _: &CommitHash) -> VcsResult<DateTime<Utc>> {
            Ok(Utc.with_ymd_and_hms(2023, 12, 31, 12, 0, 0).unwrap())
        }

        fn commit_author(&self, commit: &CommitHash) -> VcsResult<String> {
            if self.fail_author {
                return Err(VcsError::MissingField {
                    commit: commit.to_string(),
                    field: "author",
                });
            }
            Ok("Grace".into())
        }

        fn remote_url(&self) -> VcsResult<String> {
            Ok("https://github.com/org/repo.git".into())
        }

        fn first_parent(&self, _: &CommitHash) -> VcsResult<Option<CommitHash>> {
            Ok(Some(CommitHash::new("abcd").unwrap()))
        }

        fn line_delta(&self, from: &CommitHash, _: &CommitHash) -> VcsResult<LineDelta> {
            if self.fail_diff {
                return Err(VcsError::CommitNotFound(from.to_string()));
            }
            Ok(LineDelta { insertions: 1, deletions: 1 })
        }

        fn current_branch(&self) -> VcsResult<String> {
            Ok("main".into())
        }
    }

    fn hash(raw: &str) -> CommitHash {
        CommitHash::new(raw).unwrap()
    }

    #[test]
    fn test_no_manifest_skips_tests() {
        let scratch = ScratchRepo::new();
        let head = hash(&scratch.commit_file("a.txt", "one\n", "first", "Ada"));
        let vcs = GitWorkingTree::open(scratch.path()).unwrap();
        let runner = FakeRunner::new(Some(HALF_COVERED), false);

        let assembled = MetricsAssembler::new(&vcs, &runner).assemble(&head).unwrap();

        assert!(runner.seen.lock().is_empty());
        assert_eq!(assembled.metrics.test_count(), 0);
        assert_eq!(assembled.metrics.conclusion(), Conclusion::Neutral);
        assert_eq!(assembled.metrics.diff_stats().total, 0);
        // no remote configured
        assert_eq!(assembled.metrics.repository_url(), "");
        assert_eq!(assembled.metrics.source_url(), "");
        assert!(matches!(
            assembled.degradations.as_slice(),
            [Degradation::RemoteUrlUnavailable(_)]
        ));
    }

    #[test]
    fn test_full_assembly() {
        let scratch = ScratchRepo::new();
        scratch.set_remote("origin", "git@github.com:org/repo.git");
        scratch.commit_file("package.json", "{}\n", "init", "Ada");
        let head = hash(&scratch.commit_file("index.js", "a\nb\n", "Add index", "Ada"));
        let vcs = GitWorkingTree::open(scratch.path()).unwrap();
        let runner = FakeRunner::new(Some(HALF_COVERED), false);

        let assembled = MetricsAssembler::new(&vcs, &runner).assemble(&head).unwrap();
        let metrics = &assembled.metrics;

        assert!(assembled.degradations.is_empty());
        assert_eq!(metrics.author(), "Ada");
        assert_eq!(metrics.message(), "Add index");
        assert_eq!(metrics.repository_url(), "https://github.com/org/repo");
        assert_eq!(metrics.source_url(), format!("https://github.com/org/repo/commit/{}", head));
        assert_eq!(metrics.diff_stats().additions, 2);
        assert_eq!(metrics.diff_stats().deletions, 0);
        assert_eq!(metrics.diff_stats().date, metrics.timestamp().date_naive());
        assert_eq!(metrics.coverage(), 50.0);
        assert_eq!(metrics.test_count(), 4);
        assert_eq!(metrics.failed_tests(), 1);
        assert_eq!(metrics.conclusion(), Conclusion::Failure);

        // artifact gone once assembly finished
        let seen = runner.seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].exists());
    }

    #[test]
    fn test_failing_runner_report_still_used() {
        let scratch = ScratchRepo::new();
        let head = hash(&scratch.commit_file("package.json", "{}\n", "init", "Ada"));
        let vcs = GitWorkingTree::open(scratch.path()).unwrap();
        let runner = FakeRunner::new(Some(HALF_COVERED), true);

        let assembled = MetricsAssembler::new(&vcs, &runner).assemble(&head).unwrap();

        assert_eq!(assembled.metrics.test_count(), 4);
        assert!(assembled
            .degradations
            .iter()
            .any(|d| matches!(d, Degradation::TestRunnerFailure(_))));
        assert!(!assembled
            .degradations
            .iter()
            .any(|d| matches!(d, Degradation::ReportUnreadable(_))));
    }

    #[test]
    fn test_missing_or_malformed_report_degrades() {
        let scratch = ScratchRepo::new();
        let head = hash(&scratch.commit_file("package.json", "{}\n", "init", "Ada"));
        let vcs = GitWorkingTree::open(scratch.path()).unwrap();

        for runner in [FakeRunner::new(None, false), FakeRunner::new(Some("{oops"), false)] {
            let assembled = MetricsAssembler::new(&vcs, &runner).assemble(&head).unwrap();
            assert_eq!(assembled.metrics.test_count(), 0);
            assert_eq!(assembled.metrics.coverage(), 0.0);
            assert_eq!(assembled.metrics.conclusion(), Conclusion::Neutral);
            assert!(assembled
                .degradations
                .iter()
                .any(|d| matches!(d, Degradation::ReportUnreadable(_))));
        }
    }

    #[test]
    fn test_custom_build_manifest() {
        let scratch = ScratchRepo::new();
        let head = hash(&scratch.commit_file("Cargo.toml", "[package]\n", "init", "Ada"));
        let vcs = GitWorkingTree::open(scratch.path()).unwrap();
        let runner = FakeRunner::new(Some(r#"{"numTotalTests": 2}"#), false);

        let assembled = MetricsAssembler::new(&vcs, &runner)
            .with_build_manifest("Cargo.toml")
            .assemble(&head)
            .unwrap();
        assert_eq!(assembled.metrics.conclusion(), Conclusion::Success);
    }

    #[test]
    fn test_commit_lookup_is_all_or_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let vcs = BrokenVcs {
            workdir: dir.path().to_path_buf(),
            fail_author: true,
            fail_diff: false,
        };
        let runner = FakeRunner::new(None, false);

        let err = MetricsAssembler::new(&vcs, &runner).assemble(&hash("beef")).unwrap_err();
        assert_eq!(err.field, "author");
        assert_eq!(err.commit.as_str(), "beef");
    }

    #[test]
    fn test_diff_failure_degrades_to_zero() {
        let dir = tempfile::TempDir::new().unwrap();
        let vcs = BrokenVcs {
            workdir: dir.path().to_path_buf(),
            fail_author: false,
            fail_diff: true,
        };
        let runner = FakeRunner::new(None, false);

        let assembled = MetricsAssembler::new(&vcs, &runner).assemble(&hash("beef")).unwrap();
        assert_eq!(assembled.metrics.diff_stats().total, 0);
        assert_eq!(assembled.metrics.repository_url(), "https://github.com/org/repo");
        assert_eq!(
            assembled.degradations,
            vec![Degradation::DiffComputationFailure(
                VcsError::CommitNotFound("abcd".into()).to_string()
            )]
        );
    }
}
