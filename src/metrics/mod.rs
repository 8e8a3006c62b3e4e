//! metrics assembly
//!
//! Turns a resolved commit into an immutable [`CommitMetrics`] record:
//! commit facts from version control, the canonical repository URL, line
//! stats against the first parent, and test counts plus statement coverage
//! from the project's test runner.
//!
//! Only the commit facts are mandatory. Everything else degrades to an empty
//! or zero value and is reported back as a [`Degradation`].

mod assembler;
mod coverage;
mod error;
mod runner;
mod types;

pub use assembler::{Assembled, Degradation, MetricsAssembler, DEFAULT_BUILD_MANIFEST};
pub use coverage::{StatementTally, TestReport};
pub use error::{CommitLookupError, InvalidMetrics, ReportError, RunnerError};
pub use runner::{CommandTestRunner, ReportArtifact, TestRunner};
pub use types::{CommitFacts, CommitMetrics, Conclusion, DiffStats, TestOutcome};
