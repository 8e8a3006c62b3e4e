//! Normalized history: developers, repositories, branches and commits as
//! separate collections linked by document keys.

use tracing::debug;

use crate::history::error::HistoryResult;
use crate::history::records::{
    self, collection, fact_fields, measurement_fields, timestamp_value, upserted, BranchState,
};
use crate::history::{BranchContext, HistoryStore};
use crate::metrics::CommitMetrics;
use crate::storage::{Batch, DocumentKey, Filter, GitStore, Update, UpdateOutcome};

pub struct NormalizedHistory<'a> {
    store: &'a GitStore,
}

impl<'a> NormalizedHistory<'a> {
    pub fn new(store: &'a GitStore) -> Self {
        Self { store }
    }

    fn developer(batch: &mut Batch<'_>, full_name: &str) -> HistoryResult<DocumentKey> {
        let developers = collection(records::DEVELOPERS)?;
        let filter = Filter::new().eq("full_name", full_name);
        let outcome = batch.update_one(&developers, &filter, &Update::new(), true)?;
        Ok(upserted(outcome, records::DEVELOPERS)?.key)
    }

    /// Repositories are identified by URL. Without a remote the name stands in,
    /// so unrelated remote-less checkouts stay apart.
    fn repository_filter(url: &str, name: &str) -> Filter {
        if url.is_empty() {
            Filter::new().eq("url", "").eq("name", name)
        } else {
            Filter::new().eq("url", url)
        }
    }

    fn repository(batch: &mut Batch<'_>, url: &str, name: &str) -> HistoryResult<DocumentKey> {
        let repositories = collection(records::REPOSITORIES)?;
        let update = if url.is_empty() {
            Update::new()
        } else {
            Update::new().set_on_insert("name", name)
        };
        let outcome = batch.update_one(&repositories, &Self::repository_filter(url, name), &update, true)?;
        Ok(upserted(outcome, records::REPOSITORIES)?.key)
    }

    fn branch_filter(repository: &DocumentKey, branch: &str) -> Filter {
        Filter::new()
            .eq("repository_id", repository.as_str())
            .eq("name", branch)
    }
}

impl HistoryStore for NormalizedHistory<'_> {
    fn upsert(&self, metrics: &CommitMetrics, context: &BranchContext) -> HistoryResult<UpdateOutcome> {
        let sha = metrics.commit_id().as_str();

        let outcome = self.store.batch(|batch| {
            let developer = Self::developer(batch, metrics.author())?;
            let repository = Self::repository(batch, &context.repository_url, &context.repo_name)?;

            let branches = collection(records::BRANCHES)?;
            let branch_update = Update::new()
                .set("last_commit", sha)
                .set("updated_at", timestamp_value(metrics.timestamp()))
                .add_to_set("commit_ids", sha);
            let branch = batch.update_one(
                &branches,
                &Self::branch_filter(&repository, &context.branch),
                &branch_update,
                true,
            )?;
            let branch = upserted(branch, records::BRANCHES)?;

            let commits = collection(records::COMMITS)?;
            let commit_filter = Filter::new().eq("sha", sha).eq("branch_id", branch.key.as_str());
            let commit_update = Update::new()
                .set_all(measurement_fields(metrics)?)
                .set_all_on_insert(fact_fields(metrics))
                .set_on_insert("author_id", developer.as_str());
            let outcome = batch.update_one(&commits, &commit_filter, &commit_update, true)?;
            upserted(outcome, records::COMMITS)
        })?;

        debug!(
            commit = %metrics.commit_id().short(),
            branch = %context.branch,
            created = outcome.created,
            modified = outcome.modified,
            "normalized upsert"
        );
        Ok(outcome)
    }

    fn branch_state(&self, context: &BranchContext) -> HistoryResult<Option<BranchState>> {
        let repositories = collection(records::REPOSITORIES)?;
        let filter = Self::repository_filter(&context.repository_url, &context.repo_name);
        let Some(repository) = self.store.find_one(&repositories, &filter)? else {
            return Ok(None);
        };
        let branches = collection(records::BRANCHES)?;
        self.store
            .find_one(&branches, &Self::branch_filter(&repository.key, &context.branch))?
            .map(|doc| BranchState::from_document(&doc, records::BRANCHES))
            .transpose()
    }
}
