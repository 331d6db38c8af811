//! Aggregation of every repository's diff into one response.
//!
//! One request gets one deadline, shared by discovery and every git process,
//! and one byte budget, enforced by the `BoundedSink` the caller passes in.
//! Repositories are visited one at a time in discovery order, so each
//! repository's fragment is contiguous in the output.
//!
//! Failures of a single repository are logged and skipped. Running out of
//! budget or time, or losing the client, ends the response quietly: by then
//! the status line has been sent and the partial body is the answer.

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio::time::Instant;

use crate::config::Config;
use crate::error::{DiffError, DiscoveryError};
use crate::git::{self, BranchAwareDiff, GitBackend, GitCli};
use crate::models::RepoRef;
use crate::output::BoundedSink;

pub type SharedAggregator = Arc<DiffAggregator>;

/// What happened while streaming one response.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AggregateSummary {
    pub repos_found: usize,
    pub repos_visited: usize,
    pub repos_failed: usize,
    pub bytes_written: usize,
    pub truncated: bool,
    pub timed_out: bool,
    pub client_gone: bool,
}

pub struct DiffAggregator {
    config: Config,
    strategy: BranchAwareDiff,
}

impl DiffAggregator {
    pub fn new(config: Config, backend: Arc<dyn GitBackend>) -> Self {
        let strategy = BranchAwareDiff::new(backend, config.default_branches.clone());
        Self { config, strategy }
    }

    /// Aggregator that runs the configured `git` executable.
    pub fn with_git_cli(config: Config) -> Self {
        let backend = Arc::new(GitCli::new(config.git_program.clone()));
        Self::new(config, backend)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Deadline for a request starting now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.config.request_timeout
    }

    pub async fn discover(&self, deadline: Instant) -> Result<Vec<RepoRef>, DiscoveryError> {
        git::discover(&self.config.workspace_root, self.config.discovery, deadline).await
    }

    /// Writes each repository's diff into `sink` until done, out of budget,
    /// or out of time.
    pub async fn stream<W>(
        &self,
        repos: &[RepoRef],
        sink: &mut BoundedSink<W>,
        deadline: Instant,
    ) -> AggregateSummary
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut summary = AggregateSummary {
            repos_found: repos.len(),
            ..Default::default()
        };

        for repo in repos {
            if sink.is_exhausted() {
                summary.truncated = true;
                break;
            }
            if Instant::now() >= deadline {
                summary.timed_out = true;
                break;
            }

            summary.repos_visited += 1;
            let written = tokio::time::timeout_at(deadline, self.strategy.write(repo, sink, deadline))
                .await
                .unwrap_or(Err(DiffError::DeadlineExceeded));

            match written {
                Ok(()) => {}
                Err(DiffError::BudgetExhausted) => {
                    tracing::debug!(
                        "Output budget of {} bytes reached in {}",
                        sink.limit(),
                        repo.name
                    );
                    summary.truncated = true;
                    break;
                }
                Err(DiffError::DeadlineExceeded) => {
                    tracing::warn!(
                        "Request deadline reached in {}, skipping {} remaining repositories",
                        repo.name,
                        repos.len() - summary.repos_visited
                    );
                    summary.timed_out = true;
                    break;
                }
                Err(DiffError::ClientGone) => {
                    tracing::debug!("Client disconnected while streaming {}", repo.name);
                    summary.client_gone = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!("Git diff failed for {}: {}", repo.path.display(), e);
                    summary.repos_failed += 1;
                }
            }
        }

        summary.bytes_written = sink.written();
        summary
    }
}
