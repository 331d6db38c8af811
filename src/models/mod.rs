//! Request-scoped values passed through the diff pipeline.
//!
//! - `repo`: RepoRef, a discovered repository and its display name
//! - `diff`: DiffTarget and DiffBase, describing what one git invocation diffs

pub mod diff;
pub mod repo;

pub use diff::*;
pub use repo::*;
