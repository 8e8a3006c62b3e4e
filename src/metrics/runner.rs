//! Running the project's test suite.

use std::path::Path;
use std::process::{Command, Stdio};

use tempfile::TempPath;
use tracing::debug;

use crate::metrics::error::RunnerError;

/// Runs the tests of a working tree, writing a JSON report to `report_path`.
///
/// A non-zero exit is reported as an error, but the caller may still find a
/// usable report at `report_path` (failing tests exit non-zero).
pub trait TestRunner {
    fn run(&self, workdir: &Path, report_path: &Path) -> Result<(), RunnerError>;
}

/// External command; every `{report}` in its arguments becomes the report path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTestRunner {
    program: String,
    args: Vec<String>,
}

impl CommandTestRunner {
    pub const REPORT_PLACEHOLDER: &'static str = "{report}";

    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `npx jest` with coverage and a JSON report
    pub fn jest() -> Self {
        Self::new(
            "npx",
            [
                "jest",
                "--coverage",
                "--json",
                "--outputFile={report}",
                "--passWithNoTests",
            ],
        )
    }

    /// Split a whitespace-separated command line. `None` when blank.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn args_for(&self, report_path: &Path) -> Vec<String> {
        let report = report_path.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace(Self::REPORT_PLACEHOLDER, &report))
            .collect()
    }
}

impl Default for CommandTestRunner {
    fn default() -> Self {
        Self::jest()
    }
}

impl TestRunner for CommandTestRunner {
    fn run(&self, workdir: &Path, report_path: &Path) -> Result<(), RunnerError> {
        let args = self.args_for(report_path);
        debug!(program = %self.program, ?args, workdir = %workdir.display(), "running tests");

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| RunnerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(RunnerError::ExitStatus {
            program: self.program.clone(),
            status: output.status.to_string(),
            stderr: tail(stderr.trim(), 20),
        })
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// A uniquely named report file, removed when dropped.
pub struct ReportArtifact {
    path: TempPath,
}

impl ReportArtifact {
    pub fn create() -> Result<Self, RunnerError> {
        let file = tempfile::Builder::new()
            .prefix("test-results-")
            .suffix(".json")
            .tempfile()
            .map_err(RunnerError::ReportPath)?;
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_placeholder_substitution() {
        let runner = CommandTestRunner::jest();
        let args = runner.args_for(Path::new("/tmp/r.json"));
        assert_eq!(args[3], "--outputFile=/tmp/r.json");
        assert_eq!(runner.program(), "npx");
    }

    #[test]
    fn test_from_command_line() {
        assert_eq!(CommandTestRunner::from_command_line("   "), None);
        let runner = CommandTestRunner::from_command_line("cargo  test --report {report}").unwrap();
        assert_eq!(runner, CommandTestRunner::new("cargo", ["test", "--report", "{report}"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_writes_report() {
        let dir = TempDir::new().unwrap();
        let artifact = ReportArtifact::create().unwrap();
        let runner = CommandTestRunner::new("sh", ["-c", "echo '{\"numTotalTests\": 3}' > \"$0\"", "{report}"]);

        runner.run(dir.path(), artifact.path()).unwrap();
        let written = fs::read_to_string(artifact.path()).unwrap();
        assert!(written.contains("numTotalTests"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit() {
        let dir = TempDir::new().unwrap();
        let artifact = ReportArtifact::create().unwrap();
        let runner = CommandTestRunner::new("sh", ["-c", "echo boom >&2; exit 3"]);

        let err = runner.run(dir.path(), artifact.path()).unwrap_err();
        match err {
            RunnerError::ExitStatus { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let runner = CommandTestRunner::new("definitely-not-a-real-program-4242", Vec::<String>::new());
        let err = runner.run(dir.path(), Path::new("unused.json")).unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
    }

    #[test]
    fn test_artifact_removed_on_drop() {
        let artifact = ReportArtifact::create().unwrap();
        let path = artifact.path().to_path_buf();
        assert!(path.exists());
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("test-results-"));

        drop(artifact);
        assert!(!path.exists());
    }

    #[test]
    fn test_artifacts_are_distinct() {
        let a = ReportArtifact::create().unwrap();
        let b = ReportArtifact::create().unwrap();
        assert_ne!(a.path(), b.path());
    }
}
