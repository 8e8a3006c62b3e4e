//! The ingestion pipeline: resolve, assemble, persist.

use serde::Serialize;
use tracing::{debug, info};

use crate::history::{BranchContext, BranchState, DEFAULT_BRANCH};
use crate::metrics::{CommitMetrics, Degradation, MetricsAssembler, TestRunner};
use crate::pipeline::api::{IngestConfig, IngestError, IngestResult};
use crate::sequence::SequenceLog;
use crate::storage::GitStore;
use crate::vcs::{self, repository_name, CommitRef, GitWorkingTree, VersionControl};

/// What one ingestion did.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub metrics: CommitMetrics,
    pub branch: String,
    pub repo_name: String,
    /// the commit record was created rather than updated
    pub created: bool,
    /// the store changed
    pub modified: bool,
    pub degradations: Vec<String>,
}

/// An open working tree, test runner and store.
///
/// The store is released when the pipeline is dropped.
pub struct Pipeline {
    config: IngestConfig,
    vcs: GitWorkingTree,
    runner: Box<dyn TestRunner>,
    store: GitStore,
}

impl Pipeline {
    /// Open the working tree and the store named by `config`.
    pub fn open(config: IngestConfig) -> IngestResult<Self> {
        config.validate()?;

        let vcs = GitWorkingTree::open(&config.workdir)
            .map_err(IngestError::WorkingTree)?
            .with_remote(config.remote.clone());

        let opened = if config.create_if_missing {
            GitStore::open_or_init(&config.store_path)
        } else {
            GitStore::open(&config.store_path)
        };
        let store = opened.map_err(|source| IngestError::StoreUnavailable {
            path: config.store_path.clone(),
            source,
        })?;

        debug!(
            workdir = %vcs.workdir().display(),
            store = %store.path().display(),
            shape = %config.shape,
            "pipeline opened"
        );

        Ok(Self {
            runner: Box::new(config.test_command.clone()),
            config,
            vcs,
            store,
        })
    }

    /// Replace the configured test command.
    pub fn with_runner(mut self, runner: impl TestRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> &GitStore {
        &self.store
    }

    /// Ingest one commit.
    pub fn ingest(&self, reference: &CommitRef) -> IngestResult<IngestReport> {
        let commit = vcs::resolve(&self.vcs, reference)?;

        let assembled = MetricsAssembler::new(&self.vcs, self.runner.as_ref())
            .with_build_manifest(self.config.build_manifest.clone())
            .assemble(&commit)?;
        let metrics = assembled.metrics;

        let context = self.branch_context(metrics.repository_url());
        let history = self.config.shape.open(&self.store);
        let outcome = history
            .upsert(&metrics, &context)
            .map_err(|source| IngestError::StorePersistence {
                commit: commit.clone(),
                source,
            })?;

        if let Some(path) = &self.config.sequence_log {
            SequenceLog::open(path)?.record_commit(&commit)?;
        }

        info!(
            commit = %commit.short(),
            branch = %context.branch,
            conclusion = metrics.conclusion().as_str(),
            created = outcome.created,
            degraded = assembled.degradations.len(),
            "commit ingested"
        );

        Ok(IngestReport {
            metrics,
            branch: context.branch,
            repo_name: context.repo_name,
            created: outcome.created,
            modified: outcome.modified,
            degradations: assembled.degradations.iter().map(Degradation::to_string).collect(),
        })
    }

    /// The configured (or detected) branch as stored.
    pub fn branch_state(&self) -> IngestResult<Option<BranchState>> {
        let repository_url = self
            .vcs
            .remote_url()
            .map(|raw| vcs::canonical_url(&raw))
            .unwrap_or_default();
        let context = self.branch_context(&repository_url);
        self.config
            .shape
            .open(&self.store)
            .branch_state(&context)
            .map_err(IngestError::History)
    }

    /// Branch: configured, else checked out, else `main`. Repository name:
    /// configured, else the URL's last segment, else the working tree's
    /// directory name.
    pub fn branch_context(&self, repository_url: &str) -> BranchContext {
        let branch = self.config.branch.clone().unwrap_or_else(|| {
            self.vcs.current_branch().unwrap_or_else(|err| {
                debug!(error = %err, "no current branch, using {}", DEFAULT_BRANCH);
                DEFAULT_BRANCH.to_string()
            })
        });

        let repo_name = self
            .config
            .repo_name
            .clone()
            .or_else(|| repository_name(repository_url).map(str::to_string))
            .or_else(|| {
                self.vcs
                    .workdir()
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_default();

        BranchContext::new(branch, self.config.user_id.clone(), repo_name).with_repository_url(repository_url)
    }
}
