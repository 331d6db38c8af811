//! In-memory `GitBackend` for exercising the pipeline without spawning git.
//!
//! Each tracked phase writes `tracked <prefix> <base>\n` and each untracked
//! file `untracked <prefix> <path>\n`, so tests can assert on exact output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

use crate::error::DiffError;
use crate::git::backend::{DiffOutput, GitBackend};
use crate::models::DiffTarget;

#[derive(Debug, Clone, Default)]
pub struct FakeRepo {
    branches: HashMap<String, String>,
    head: Option<String>,
    merge_bases: HashMap<String, String>,
    untracked: Vec<PathBuf>,
    failing_tracked: bool,
    hanging: bool,
    payload: Vec<u8>,
}

impl FakeRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn branch(mut self, name: &str, commit: &str) -> Self {
        self.branches.insert(name.to_string(), commit.to_string());
        self
    }

    /// Attaches HEAD to `name`; without this HEAD is detached.
    pub fn checkout(mut self, name: &str) -> Self {
        self.head = Some(name.to_string());
        self
    }

    pub fn merge_base(mut self, with: &str, commit: &str) -> Self {
        self.merge_bases.insert(with.to_string(), commit.to_string());
        self
    }

    pub fn untracked(mut self, path: &str) -> Self {
        self.untracked.push(PathBuf::from(path));
        self
    }

    pub fn failing_tracked(mut self) -> Self {
        self.failing_tracked = true;
        self
    }

    /// Tracked diffs never finish.
    pub fn hanging(mut self) -> Self {
        self.hanging = true;
        self
    }

    /// Extra bytes appended to the tracked diff.
    pub fn payload(mut self, bytes: usize) -> Self {
        self.payload = vec![b'+'; bytes];
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeGit {
    repos: HashMap<PathBuf, FakeRepo>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(mut self, path: impl Into<PathBuf>, repo: FakeRepo) -> Self {
        self.repos.insert(path.into(), repo);
        self
    }

    fn repo(&self, path: &Path) -> Result<&FakeRepo, DiffError> {
        self.repos
            .get(path)
            .ok_or_else(|| DiffError::Probe(format!("{} is not a repository", path.display())))
    }
}

#[async_trait]
impl GitBackend for FakeGit {
    async fn resolve(
        &self,
        repo: &Path,
        rev: &str,
        _deadline: Instant,
    ) -> Result<Option<String>, DiffError> {
        let repo = self.repo(repo)?;
        if rev != "HEAD" {
            return Ok(repo.branches.get(rev).cloned());
        }
        Ok(match &repo.head {
            Some(branch) => repo.branches.get(branch).cloned(),
            None if !repo.branches.is_empty() => Some("detached".to_string()),
            None => None,
        })
    }

    async fn current_branch(
        &self,
        repo: &Path,
        _deadline: Instant,
    ) -> Result<Option<String>, DiffError> {
        Ok(self.repo(repo)?.head.clone())
    }

    async fn merge_base(
        &self,
        repo: &Path,
        a: &str,
        _b: &str,
        _deadline: Instant,
    ) -> Result<Option<String>, DiffError> {
        Ok(self.repo(repo)?.merge_bases.get(a).cloned())
    }

    async fn untracked_files(
        &self,
        repo: &Path,
        _deadline: Instant,
    ) -> Result<Vec<PathBuf>, DiffError> {
        Ok(self.repo(repo)?.untracked.clone())
    }

    async fn diff(
        &self,
        repo: &Path,
        target: &DiffTarget,
        prefix: &str,
        out: &mut DiffOutput<'_>,
        _deadline: Instant,
    ) -> Result<(), DiffError> {
        let repo = self.repo(repo)?;
        let mut bytes = match target {
            DiffTarget::Tracked { base } => {
                if repo.hanging {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                if repo.failing_tracked {
                    return Err(DiffError::CommandFailed {
                        command: format!("git diff {}", base),
                        status: "exit status: 128".to_string(),
                        stderr: "fatal: bad revision".to_string(),
                    });
                }
                format!("tracked {} {}\n", prefix, base).into_bytes()
            }
            DiffTarget::Untracked { path } => {
                format!("untracked {} {}\n", prefix, path.display()).into_bytes()
            }
        };
        if matches!(target, DiffTarget::Tracked { .. }) {
            bytes.extend_from_slice(&repo.payload);
        }

        out.write_all(&bytes).await.map_err(DiffError::from_sink)
    }
}
