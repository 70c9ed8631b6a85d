//! Phased fleet rollout
//!
//! Machines inside a phase deploy concurrently on their own hosts. A phase is
//! joined before the next one starts, and a phase with any failure halts the
//! rollout. Nothing is shared between the spawned tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use stackfleet_exec::{ExecError, RemoteExecutor, shell_quote};
use tracing::{error, info, instrument};

use crate::config::{FleetSettings, HostConfig};
use crate::error::CoreError;
use crate::profile::MachineId;

/// Builds the executor used to reach a host
pub trait ExecutorFactory: Send + Sync {
    /// # Errors
    /// When the host's credentials cannot be resolved
    fn executor_for(&self, host: &HostConfig) -> Result<Arc<dyn RemoteExecutor>, ExecError>;
}

/// Flags forwarded to every remote `deploy`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutOptions {
    /// Environment file, relative to the host's workdir
    pub env_file: String,
    pub skip_pull: bool,
    pub skip_build: bool,
}

impl Default for RolloutOptions {
    fn default() -> Self {
        Self {
            env_file: ".env".to_string(),
            skip_pull: false,
            skip_build: false,
        }
    }
}

/// One machine bound to the host it deploys on
#[derive(Debug, Clone)]
pub struct PlannedMachine {
    pub machine: MachineId,
    pub host: HostConfig,
}

/// Command run on `host` to deploy `machine`
#[must_use]
pub fn remote_command(host: &HostConfig, machine: MachineId, options: &RolloutOptions) -> String {
    let mut cmd = format!(
        "cd {} && {} {} --action deploy --force --env {}",
        shell_quote(&host.workdir),
        shell_quote(&host.deploy_bin),
        machine,
        shell_quote(&options.env_file)
    );
    if options.skip_pull {
        cmd.push_str(" --skip-pull");
    }
    if options.skip_build {
        cmd.push_str(" --skip-build");
    }
    cmd
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutStatus {
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct MachineRollout {
    pub machine: MachineId,
    pub host: String,
    pub status: RolloutStatus,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct FleetReport {
    /// Results per phase that ran, in phase order
    pub phases: Vec<Vec<MachineRollout>>,
    /// Index of the phase that failed, if the rollout stopped early
    pub halted_at: Option<usize>,
}

impl FleetReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.halted_at.is_none()
    }
}

pub struct FleetRollout {
    settings: FleetSettings,
    factory: Arc<dyn ExecutorFactory>,
    options: RolloutOptions,
}

impl FleetRollout {
    pub fn new(
        settings: FleetSettings,
        factory: Arc<dyn ExecutorFactory>,
        options: RolloutOptions,
    ) -> Self {
        Self {
            settings,
            factory,
            options,
        }
    }

    /// Resolve every phase entry to a machine and its host.
    ///
    /// # Errors
    /// `UnknownMachine` for ids outside the catalog, `ConfigError` when a
    /// machine has no `[[fleet.host]]` entry
    pub fn plan(&self) -> Result<Vec<Vec<PlannedMachine>>, CoreError> {
        let mut phases = Vec::with_capacity(self.settings.phases.len());
        for phase in &self.settings.phases {
            let mut planned = Vec::with_capacity(phase.len());
            for id in phase {
                let machine: MachineId = id.parse()?;
                let host = self
                    .settings
                    .hosts
                    .iter()
                    .find(|h| h.machine == *id)
                    .ok_or_else(|| {
                        CoreError::ConfigError(format!("no [[fleet.host]] entry for {id}"))
                    })?;
                planned.push(PlannedMachine {
                    machine,
                    host: host.clone(),
                });
            }
            phases.push(planned);
        }
        Ok(phases)
    }

    #[must_use]
    pub fn options(&self) -> &RolloutOptions {
        &self.options
    }

    /// Validate the plan, then deploy phase by phase.
    ///
    /// # Errors
    /// Plan validation errors only; deploy failures are reported in the
    /// returned [`FleetReport`]
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<FleetReport, CoreError> {
        let plan = self.plan()?;
        let mut report = FleetReport::default();

        for (index, phase) in plan.into_iter().enumerate() {
            let machines: Vec<_> = phase.iter().map(|p| p.machine.as_str()).collect();
            info!(phase = index + 1, ?machines, "starting phase");

            let handles: Vec<_> = phase
                .into_iter()
                .map(|planned| {
                    let factory = Arc::clone(&self.factory);
                    let command = remote_command(&planned.host, planned.machine, &self.options);
                    let timeout = self.settings.command_timeout();
                    let machine = planned.machine;
                    let host = planned.host.addr.clone();
                    let task = tokio::spawn(async move {
                        deploy_machine(factory.as_ref(), &planned.host, &command, timeout).await
                    });
                    (machine, host, task)
                })
                .collect();

            let mut results = Vec::with_capacity(handles.len());
            for (machine, host, task) in handles {
                let (status, elapsed) = task.await.unwrap_or_else(|e| {
                    (RolloutStatus::Failed(format!("deploy task aborted: {e}")), Duration::ZERO)
                });
                if let RolloutStatus::Failed(reason) = &status {
                    error!(%machine, %host, %reason, "machine deploy failed");
                } else {
                    info!(%machine, %host, ?elapsed, "machine deployed");
                }
                results.push(MachineRollout {
                    machine,
                    host,
                    status,
                    elapsed,
                });
            }

            let failed = results
                .iter()
                .any(|r| matches!(r.status, RolloutStatus::Failed(_)));
            report.phases.push(results);
            if failed {
                report.halted_at = Some(index);
                break;
            }
        }
        Ok(report)
    }
}

async fn deploy_machine(
    factory: &dyn ExecutorFactory,
    host: &HostConfig,
    command: &str,
    timeout: Duration,
) -> (RolloutStatus, Duration) {
    let started = Instant::now();
    let status = match factory.executor_for(host) {
        Ok(executor) => match executor.run_with_timeout(command, timeout).await {
            Ok(result) if result.success() => RolloutStatus::Succeeded,
            Ok(result) => RolloutStatus::Failed(format!(
                "exit {}: {}",
                result.status,
                result.failure_message().lines().last().unwrap_or_default()
            )),
            Err(e) => RolloutStatus::Failed(e.to_string()),
        },
        Err(e) => RolloutStatus::Failed(e.to_string()),
    };
    (status, started.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(machine: &str) -> HostConfig {
        HostConfig {
            machine: machine.to_string(),
            addr: "10.0.0.10".to_string(),
            user: "root".to_string(),
            port: 22,
            ssh_key: None,
            workdir: "/opt/stack fleet".to_string(),
            deploy_bin: "deploy".to_string(),
        }
    }

    #[test]
    fn test_remote_command() {
        let options = RolloutOptions {
            skip_build: true,
            ..RolloutOptions::default()
        };
        assert_eq!(
            remote_command(&host("core-db"), MachineId::CoreDb, &options),
            "cd '/opt/stack fleet' && deploy core-db --action deploy --force --env .env --skip-build"
        );
    }
}
