//! Branch-aware diff of a single repository.
//!
//! The fragment for one repository is built from two phases:
//! 1. tracked changes, diffed against `HEAD`, or against the point where the
//!    current branch forked from the default branch when on a feature branch
//! 2. every untracked (and not ignored) file, as an addition from nothing
//!
//! Used by: DiffAggregator, once per discovered repository

use std::path::Path;
use std::sync::Arc;

use tokio::time::Instant;

use crate::error::DiffError;
use crate::git::backend::{DiffOutput, GitBackend};
use crate::models::{DiffBase, DiffTarget, RepoRef};

pub struct BranchAwareDiff {
    backend: Arc<dyn GitBackend>,
    default_branches: Vec<String>,
}

impl BranchAwareDiff {
    pub fn new(backend: Arc<dyn GitBackend>, default_branches: Vec<String>) -> Self {
        Self {
            backend,
            default_branches,
        }
    }

    /// First candidate branch name that exists in the repository.
    pub async fn default_branch(
        &self,
        repo: &Path,
        deadline: Instant,
    ) -> Result<Option<String>, DiffError> {
        for name in &self.default_branches {
            if self.backend.resolve(repo, name, deadline).await?.is_some() {
                return Ok(Some(name.clone()));
            }
        }
        Ok(None)
    }

    /// Decides what the tracked phase compares the working tree against.
    pub async fn plan(&self, repo: &Path, deadline: Instant) -> Result<DiffBase, DiffError> {
        if self.backend.resolve(repo, "HEAD", deadline).await?.is_none() {
            return Ok(DiffBase::Unborn);
        }

        let default_branch = self.default_branch(repo, deadline).await?;
        let current_branch = self.backend.current_branch(repo, deadline).await?;

        let default_branch = match (default_branch, current_branch) {
            (Some(default), Some(current)) if default != current => default,
            _ => return Ok(DiffBase::WorkingTree),
        };

        // Unrelated histories have no fork point; compare with the branch tip.
        let merge_base = self
            .backend
            .merge_base(repo, &default_branch, "HEAD", deadline)
            .await?
            .unwrap_or_else(|| default_branch.clone());

        Ok(DiffBase::Divergence {
            default_branch,
            merge_base,
        })
    }

    /// Streams the full fragment for `repo` into `out`.
    ///
    /// A failed phase is logged and skipped; budget, deadline and disconnect
    /// errors end the fragment and are returned to the caller.
    pub async fn write(
        &self,
        repo: &RepoRef,
        out: &mut DiffOutput<'_>,
        deadline: Instant,
    ) -> Result<(), DiffError> {
        let plan = self.plan(&repo.path, deadline).await?;
        tracing::debug!("Diff plan for {}: {:?}", repo.name, plan);

        match plan.revision() {
            Some(base) => {
                let target = DiffTarget::Tracked {
                    base: base.to_string(),
                };
                self.run_phase(repo, &target, out, deadline).await?;
            }
            None => tracing::debug!("{} has no commits, skipping tracked changes", repo.name),
        }

        let untracked = self.backend.untracked_files(&repo.path, deadline).await?;
        for path in untracked {
            let target = DiffTarget::Untracked { path };
            self.run_phase(repo, &target, out, deadline).await?;
        }

        Ok(())
    }

    async fn run_phase(
        &self,
        repo: &RepoRef,
        target: &DiffTarget,
        out: &mut DiffOutput<'_>,
        deadline: Instant,
    ) -> Result<(), DiffError> {
        match self
            .backend
            .diff(&repo.path, target, &repo.name, out, deadline)
            .await
        {
            Err(e) if !e.is_terminal() => {
                tracing::warn!("Diff of {:?} failed in {}: {}", target, repo.name, e);
                Ok(())
            }
            other => other,
        }
    }
}
