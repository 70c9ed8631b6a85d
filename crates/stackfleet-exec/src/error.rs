//! Error types for stackfleet-exec

use std::time::Duration;

use thiserror::Error;

/// Errors raised while running a command locally or on a fleet host
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Could not reach the host
    #[error("connection to {host} failed: {reason}")]
    ConnectionFailed {
        /// Host that was dialled
        host: String,
        /// Underlying transport error
        reason: String,
    },

    /// Host rejected our credentials
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Command did not finish in time
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Limit that was exceeded
        timeout: Duration,
    },

    /// SSH identity could not be loaded
    #[error("SSH key error: {0}")]
    SshKeyError(String),

    /// Process could not be started
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error while talking to the process or channel
    #[error("I/O error: {0}")]
    IoError(String),

    /// Session was used before `connect`
    #[error("not connected")]
    NotConnected,
}

impl ExecError {
    /// Transport-level failures that may succeed on a later attempt
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecError::ConnectionFailed { .. } | ExecError::Timeout { .. }
        )
    }
}
