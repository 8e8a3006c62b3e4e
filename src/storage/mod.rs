//! storage layer: a Git-backed document store
//!
//! this is the persistent store the metrics history is written to. The
//! history adapters use this API and never touch git2 directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         GitStore                            │
//! │   (batch / find / insert_one / update_one with upsert)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    tree     │       │    blob     │       │    refs     │
//!  │(collections)│       │ (documents) │       │   (main)    │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!         └─────────────────────┼─────────────────────┘
//!                               ▼
//!                        ┌─────────────┐
//!                        │   commit    │
//!                        │ (one/batch) │
//!                        └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use commit_metrics::storage::{CollectionName, Filter, GitStore, Update};
//!
//! let store = GitStore::open_or_init("./metrics-store")?;
//! let developers = CollectionName::new("developers")?;
//!
//! // find-or-create
//! let outcome = store
//!     .update_one(&developers, &Filter::new().eq("full_name", "Ada"), &Update::new(), true)?
//!     .expect("upsert always yields an outcome");
//!
//! // several documents, one commit
//! store.batch(|batch| {
//!     batch.update_one(&developers, &Filter::new().eq("full_name", "Ada"), &Update::new(), true)?;
//!     batch.update_one(&developers, &Filter::new().eq("full_name", "Grace"), &Update::new(), true)?;
//!     Ok::<_, StorageError>(())
//! })?;
//! ```

mod batch;
mod blob;
mod commit;
mod error;
mod filter;
mod refs;
mod repository;
mod tree;
mod types;

pub use blob::{into_fields, Document, Fields};
pub use batch::Batch;
pub use error::{StorageError, StorageResult};
pub use filter::{Filter, Update, UpdateOutcome};
pub use repository::GitStore;
pub use types::{CollectionName, CommitId, DocumentKey, InvalidNameError};
