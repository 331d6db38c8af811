//! Runtime configuration for the diff pipeline.
//!
//! Built once in `main` from the command line and threaded into the
//! aggregator, so tests can run several differently configured instances.

use std::path::PathBuf;
use std::time::Duration;

/// Hard ceiling on the bytes of one diff response.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 5 * 1024 * 1024;

/// Time budget for one diff request, discovery included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Branch names probed, in order, to find a repository's default branch.
pub const DEFAULT_BRANCH_CANDIDATES: [&str; 2] = ["main", "master"];

/// How the workspace is searched for repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DiscoveryPolicy {
    /// Walk the whole tree, stopping at each repository root.
    #[default]
    Recursive,
    /// Only look at the workspace's immediate children.
    Shallow,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub workspace_root: PathBuf,
    pub discovery: DiscoveryPolicy,
    pub request_timeout: Duration,
    pub max_output_bytes: usize,
    pub default_branches: Vec<String>,
    pub git_program: PathBuf,
}

impl Config {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            discovery: DiscoveryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            default_branches: DEFAULT_BRANCH_CANDIDATES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            git_program: PathBuf::from("git"),
        }
    }
}
