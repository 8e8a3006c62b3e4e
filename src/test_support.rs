//! Scratch git repositories and sample records for tests.

use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use git2::{Oid, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

use crate::metrics::{CommitFacts, CommitMetrics, TestOutcome};
use crate::vcs::{CommitHash, LineDelta};

/// A throwaway working tree whose HEAD starts on an unborn `main`.
pub struct ScratchRepo {
    dir: TempDir,
    repo: Repository,
}

impl ScratchRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// write a file into the working tree without committing it
    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// write, stage and commit one file on HEAD; returns the full hash
    pub fn commit_file(&self, relative: &str, content: &str, message: &str, author: &str) -> String {
        self.write_file(relative, content);

        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(relative)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        let sig = Signature::now(author, "dev@example.com").unwrap();
        let parent = self.repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
            .to_string()
    }

    pub fn set_remote(&self, name: &str, url: &str) {
        self.repo.remote(name, url).unwrap();
    }

    /// create a branch at HEAD and switch to it
    pub fn checkout_branch(&self, name: &str) {
        let head = self.repo.head().unwrap().peel_to_commit().unwrap();
        self.repo.branch(name, &head, false).unwrap();
        self.repo.set_head(&format!("refs/heads/{}", name)).unwrap();
    }

    pub fn detach_at(&self, hash: &str) {
        self.repo.set_head_detached(Oid::from_str(hash).unwrap()).unwrap();
    }
}

/// Metrics for `sha` as if assembled from `https://github.com/org/repo`.
pub fn sample_metrics(sha: &str, message: &str, outcome: TestOutcome) -> CommitMetrics {
    let facts = CommitFacts {
        commit_id: CommitHash::new(sha).unwrap(),
        author: "Ada Lovelace".to_string(),
        message: message.to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap(),
    };
    let delta = LineDelta { insertions: 3, deletions: 1 };
    CommitMetrics::new(facts, "https://github.com/org/repo".to_string(), delta, outcome)
}
