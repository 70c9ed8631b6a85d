//! Error types for stackfleet-compose

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while driving a bundle or network
#[derive(Error, Debug, Clone)]
pub enum ComposeError {
    /// Neither `docker compose` nor `docker-compose` answered
    #[error("docker compose not found")]
    ComposeNotFound,

    /// Bundle file missing on disk
    #[error("bundle file not found: {}", .0.display())]
    BundleNotFound(PathBuf),

    /// Bundle file is not valid YAML
    #[error("invalid bundle {}: {message}", path.display())]
    InvalidBundle {
        /// Bundle file path
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// A compose or docker command exited non-zero
    #[error("`{command}` failed ({status}): {message}")]
    CommandFailed {
        /// Subcommand that failed, e.g. `compose pull`
        command: String,
        /// Exit status
        status: i32,
        /// stderr, or stdout when stderr was empty
        message: String,
    },

    /// Output could not be parsed
    #[error("parse error: {0}")]
    ParseError(String),

    /// Executor failed before the command could report a status
    #[error("execution error: {0}")]
    ExecutionError(String),
}

impl From<stackfleet_exec::ExecError> for ComposeError {
    fn from(e: stackfleet_exec::ExecError) -> Self {
        ComposeError::ExecutionError(e.to_string())
    }
}
