//! commit-metrics - per-commit quality metrics kept in a Git-backed store
//!
//! For one commit of a working tree this crate gathers the commit facts, the
//! line delta against its parent and the test/coverage results of the
//! project's test runner, then records them in a history store. The store is
//! itself a Git repository: every collection is a directory, every record a
//! JSON file, and every change a commit.
//!
//! # Example
//!
//! ```no_run
//! use commit_metrics::pipeline::{IngestConfig, Pipeline};
//! use commit_metrics::vcs::CommitRef;
//!
//! let pipeline = Pipeline::open(IngestConfig::new(".").store_path("./.commit-metrics")).unwrap();
//! let report = pipeline.ingest(&CommitRef::Head).unwrap();
//! println!("{} -> {:?}", report.metrics.commit_id(), report.metrics.conclusion());
//! ```

pub mod history;
pub mod metrics;
pub mod pipeline;
pub mod sequence;
pub mod storage;
pub mod vcs;

#[cfg(test)]
mod test_support;
