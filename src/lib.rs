//! Live view of uncommitted changes across every git repository in a
//! workspace, served over HTTP as one unified diff.
//!
//! Pipeline: `git::discovery` finds repositories, `git::strategy` decides what
//! each one's diff covers, `git::backend` runs git, `output` caps the response
//! size and `aggregate` ties them together under one request deadline.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod git;
pub mod models;
pub mod output;
pub mod routes;

pub use aggregate::{DiffAggregator, SharedAggregator};
pub use config::{Config, DiscoveryPolicy};
pub use routes::create_router;
