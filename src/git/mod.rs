pub mod backend;
pub mod discovery;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{DiffOutput, GitBackend, GitCli};
pub use discovery::discover;
pub use strategy::BranchAwareDiff;
