//! Diff phase descriptions.
//!
//! - `DiffTarget`: the input of one `git diff` invocation
//! - `DiffBase`: what the tracked phase of a repository compares against
//!
//! Used by: BranchAwareDiff to plan a repository, GitBackend to run it

use std::path::PathBuf;

/// One diff phase for a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffTarget {
    /// Working tree (staged and unstaged) against `base`.
    Tracked { base: String },
    /// A file git does not track, shown as added from nothing.
    Untracked { path: PathBuf },
}

/// Outcome of inspecting a repository's branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffBase {
    /// On the default branch, detached, or no default branch: uncommitted
    /// changes only.
    WorkingTree,
    /// On a feature branch: everything since it forked from the default
    /// branch, uncommitted changes included.
    Divergence {
        default_branch: String,
        merge_base: String,
    },
    /// HEAD has no commit yet; only untracked files can be shown.
    Unborn,
}

impl DiffBase {
    /// Revision the tracked phase diffs the working tree against.
    pub fn revision(&self) -> Option<&str> {
        match self {
            DiffBase::WorkingTree => Some("HEAD"),
            DiffBase::Divergence { merge_base, .. } => Some(merge_base),
            DiffBase::Unborn => None,
        }
    }
}
