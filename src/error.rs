//! Error types and HTTP response mapping.
//!
//! - `DiscoveryError`: the workspace could not be scanned (fatal to a request)
//! - `DiffError`: one repository's diff could not be produced (logged, skipped)
//! - `AppError`: request-level failures, rendered by Axum as plain-text 500s
//!
//! Once a diff response has started streaming its status is committed, so only
//! errors raised before the first byte ever reach `AppError`.

use std::io;
use std::path::PathBuf;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("cannot read {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("timed out while scanning {path:?}")]
    TimedOut { path: PathBuf },
}

#[derive(Error, Debug)]
pub enum DiffError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("repository probe failed: {0}")]
    Probe(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("output budget exhausted")]
    BudgetExhausted,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("client went away")]
    ClientGone,
}

impl DiffError {
    /// Classifies a failed write into the response sink.
    pub fn from_sink(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WriteZero => DiffError::BudgetExhausted,
            io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => DiffError::ClientGone,
            _ => DiffError::Io(err),
        }
    }

    /// Terminal errors end the whole response, not just one repository.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DiffError::BudgetExhausted | DiffError::DeadlineExceeded | DiffError::ClientGone
        )
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to find git repositories: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Discovery(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!("{}", self);

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
