//! Ingestion pipeline.
//!
//! One ingestion resolves a reference to a concrete commit, assembles its
//! metrics from the working tree and persists them to the history store.
//! Resolution, commit lookup and persistence failures abort the run; the
//! rest only degrade the record.

mod api;
mod ingest;

pub use api::{IngestConfig, IngestError, IngestResult};
pub use ingest::{IngestReport, Pipeline};
