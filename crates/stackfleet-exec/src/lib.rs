//! stackfleet-exec: command execution seam
//!
//! Runs shell commands on the local machine or on a fleet host over SSH.
//! Everything above this crate talks to a `RemoteExecutor` trait object.

pub mod error;
pub mod keys;
pub mod local;
pub mod quote;
pub mod result;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use keys::{KeyError, KeySource, ResolvedKey};
pub use local::LocalExecutor;
pub use quote::shell_quote;
pub use result::{CommandResult, ConnectionInfo};
pub use ssh::{SshExecutor, SshExecutorBuilder};
pub use traits::RemoteExecutor;
