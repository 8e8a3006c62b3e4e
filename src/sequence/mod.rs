//! sequence log
//!
//! A small JSON array on disk recording commit markers (`{"commitId": ...}`)
//! and test-run markers (`{"testId": ...}`) in order. It decides which
//! test-run id the next run reports under: the last run's id is reused
//! until a commit marker starts a new run.

mod error;
mod log;

pub use error::{SequenceError, SequenceResult};
pub use log::{fresh_id, next_test_run_id, EntryKind, SequenceEntry, SequenceLog};
