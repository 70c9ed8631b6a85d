//! Executor construction for fleet hosts

use std::sync::Arc;

use stackfleet_core::{ExecutorFactory, HostConfig};
use stackfleet_exec::{ExecError, KeySource, LocalExecutor, RemoteExecutor, SshExecutorBuilder};

/// Local execution for loopback hosts, SSH for everything else
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExecutorFactory;

impl ExecutorFactory for DefaultExecutorFactory {
    fn executor_for(&self, host: &HostConfig) -> Result<Arc<dyn RemoteExecutor>, ExecError> {
        if host.is_local() {
            return Ok(Arc::new(LocalExecutor::new()));
        }

        let executor = SshExecutorBuilder::new(&host.addr, &host.user)
            .with_port(host.port)
            .with_key_source(KeySource::from_config(host.ssh_key.as_deref()))
            .build()?;
        Ok(Arc::new(executor))
    }
}
