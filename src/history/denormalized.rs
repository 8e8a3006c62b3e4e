//! Denormalized history: one self-contained document per commit and one per
//! `(user, repository, branch)`.

use tracing::debug;

use crate::history::error::HistoryResult;
use crate::history::records::{
    self, collection, fact_fields, measurement_fields, timestamp_value, upserted, BranchState,
};
use crate::history::{BranchContext, HistoryStore};
use crate::metrics::CommitMetrics;
use crate::storage::{DocumentKey, Filter, GitStore, Update, UpdateOutcome};

pub struct DenormalizedHistory<'a> {
    store: &'a GitStore,
}

impl<'a> DenormalizedHistory<'a> {
    pub fn new(store: &'a GitStore) -> Self {
        Self { store }
    }

    fn branch_filter(context: &BranchContext) -> Filter {
        Filter::new()
            .eq("user_id", context.user_id.as_str())
            .eq("repo_name", context.repo_name.as_str())
            .eq("branch_name", context.branch.as_str())
    }
}

impl HistoryStore for DenormalizedHistory<'_> {
    fn upsert(&self, metrics: &CommitMetrics, context: &BranchContext) -> HistoryResult<UpdateOutcome> {
        let sha = metrics.commit_id().as_str();

        let outcome = self.store.batch(|batch| {
            let commits = collection(records::COMMIT_HISTORY)?;
            let commit_update = Update::new()
                .set_all(measurement_fields(metrics)?)
                .set_all_on_insert(fact_fields(metrics))
                .set_on_insert("author", metrics.author())
                .set_on_insert("repository_url", metrics.repository_url());
            let outcome = batch.update_one(
                &commits,
                &Filter::by_key(DocumentKey::new(sha)?),
                &commit_update,
                true,
            )?;

            let branches = collection(records::BRANCH_HISTORY)?;
            let branch_update = Update::new()
                .set("last_commit", sha)
                .set("updated_at", timestamp_value(metrics.timestamp()))
                .add_to_set("commit_ids", sha);
            batch.update_one(&branches, &Self::branch_filter(context), &branch_update, true)?;
            upserted(outcome, records::COMMIT_HISTORY)
        })?;

        debug!(
            commit = %metrics.commit_id().short(),
            branch = %context.branch,
            user = %context.user_id,
            created = outcome.created,
            modified = outcome.modified,
            "denormalized upsert"
        );
        Ok(outcome)
    }

    fn branch_state(&self, context: &BranchContext) -> HistoryResult<Option<BranchState>> {
        let branches = collection(records::BRANCH_HISTORY)?;
        self.store
            .find_one(&branches, &Self::branch_filter(context))?
            .map(|doc| BranchState::from_document(&doc, records::BRANCH_HISTORY))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::TestOutcome;
    use crate::storage::CollectionName;
    use crate::test_support::sample_metrics;
    use crate::vcs::CommitHash;
    use serde_json::json;
    use tempfile::TempDir;

    const SHA_A: &str = "aaaa1111";
    const SHA_B: &str = "bbbb2222";

    fn setup() -> (TempDir, GitStore) {
        let dir = TempDir::new().unwrap();
        let store = GitStore::init(dir.path()).unwrap();
        (dir, store)
    }

    fn context(user: &str, branch: &str) -> BranchContext {
        BranchContext::new(branch, user, "repo")
    }

    #[test]
    fn test_commit_keyed_by_identity() {
        let (_dir, store) = setup();
        let history = DenormalizedHistory::new(&store);
        let metrics = sample_metrics(SHA_A, "Add parser", TestOutcome::new(2, 0, 100.0).unwrap());

        let outcome = history.upsert(&metrics, &context("u-1", "main")).unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.key.as_str(), SHA_A);

        let doc = store
            .find_one(
                &CollectionName::new(records::COMMIT_HISTORY).unwrap(),
                &Filter::by_key(DocumentKey::new(SHA_A).unwrap()),
            )
            .unwrap()
            .unwrap();
        assert_eq!(doc.get_str("author"), Some("Ada Lovelace"));
        assert_eq!(doc.get_str("repository_url"), Some("https://github.com/org/repo"));
        assert_eq!(doc.get("coverage"), Some(&json!(100.0)));
    }

    #[test]
    fn test_branch_set_semantics() {
        let (_dir, store) = setup();
        let history = DenormalizedHistory::new(&store);
        let metrics = sample_metrics(SHA_A, "a", TestOutcome::none());
        let ctx = context("u-1", "main");

        history.upsert(&metrics, &ctx).unwrap();
        let first = history.branch_state(&ctx).unwrap().unwrap();
        let head = store.head().unwrap();

        history.upsert(&metrics, &ctx).unwrap();
        let second = history.branch_state(&ctx).unwrap().unwrap();

        assert_eq!(first.commit_ids.len(), 1);
        assert_eq!(second.commit_ids.len(), first.commit_ids.len());
        assert_eq!(store.head().unwrap(), head);
    }

    #[test]
    fn test_last_commit_reset_to_existing_member() {
        let (_dir, store) = setup();
        let history = DenormalizedHistory::new(&store);
        let ctx = context("u-1", "feature/login");

        history.upsert(&sample_metrics(SHA_A, "a", TestOutcome::none()), &ctx).unwrap();
        history.upsert(&sample_metrics(SHA_B, "b", TestOutcome::none()), &ctx).unwrap();
        history.upsert(&sample_metrics(SHA_A, "a", TestOutcome::none()), &ctx).unwrap();

        let state = history.branch_state(&ctx).unwrap().unwrap();
        assert_eq!(state.name, "feature/login");
        assert_eq!(state.last_commit, CommitHash::new(SHA_A).unwrap());
        assert_eq!(state.commit_ids.len(), 2);
    }

    #[test]
    fn test_facts_written_once() {
        let (_dir, store) = setup();
        let history = DenormalizedHistory::new(&store);
        let ctx = context("u-1", "main");

        history
            .upsert(&sample_metrics(SHA_A, "Original", TestOutcome::none()), &ctx)
            .unwrap();
        history
            .upsert(&sample_metrics(SHA_A, "Changed", TestOutcome::new(1, 1, 0.0).unwrap()), &ctx)
            .unwrap();

        let doc = store
            .find_one(
                &CollectionName::new(records::COMMIT_HISTORY).unwrap(),
                &Filter::by_key(DocumentKey::new(SHA_A).unwrap()),
            )
            .unwrap()
            .unwrap();
        assert_eq!(doc.get_str("message"), Some("Original"));
        assert_eq!(doc.get_str("conclusion"), Some("failure"));
    }

    #[test]
    fn test_branches_scoped_per_user() {
        let (_dir, store) = setup();
        let history = DenormalizedHistory::new(&store);

        history
            .upsert(&sample_metrics(SHA_A, "a", TestOutcome::none()), &context("u-1", "main"))
            .unwrap();
        history
            .upsert(&sample_metrics(SHA_B, "b", TestOutcome::none()), &context("u-2", "main"))
            .unwrap();

        let one = history.branch_state(&context("u-1", "main")).unwrap().unwrap();
        let two = history.branch_state(&context("u-2", "main")).unwrap().unwrap();
        assert_eq!(one.commit_ids, vec![CommitHash::new(SHA_A).unwrap()]);
        assert_eq!(two.commit_ids, vec![CommitHash::new(SHA_B).unwrap()]);
        // one global commit record per identity
        assert_eq!(
            store.count(&CollectionName::new(records::COMMIT_HISTORY).unwrap()).unwrap(),
            2
        );
    }

    #[test]
    fn test_upsert_is_one_store_commit() {
        let (_dir, store) = setup();
        let history = DenormalizedHistory::new(&store);
        let before = store.head().unwrap();

        history
            .upsert(&sample_metrics(SHA_A, "a", TestOutcome::none()), &context("u-1", "main"))
            .unwrap();

        let repo = git2::Repository::open(store.path()).unwrap();
        let head = repo.find_commit(store.head().unwrap().raw()).unwrap();
        assert_eq!(head.parent_id(0).unwrap(), before.raw());
        let message = head.message().unwrap();
        assert!(message.starts_with("[BATCH] 2 documents"));
        assert!(message.contains(&format!("[INSERT] commit_history/{}", SHA_A)));
    }
}
