//! Executor trait shared by local and SSH backends

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Runs shell commands somewhere: on this machine or on a fleet host.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a command and capture its output
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Run a command, failing with `ExecError::Timeout` once `timeout` elapses
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError>;

    /// Run a command with its output forwarded to the operator's terminal.
    ///
    /// Returns the exit status. Dropping the returned future terminates the
    /// command, which is how callers cancel unbounded commands such as
    /// `logs -f`.
    async fn stream(&self, cmd: &str) -> Result<i32, ExecError>;

    /// Whether a session is currently established
    fn is_connected(&self) -> bool {
        true
    }

    /// Short backend name for logs
    fn executor_type(&self) -> &'static str;
}
