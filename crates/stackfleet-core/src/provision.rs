//! Image provisioning pipeline: pull, then build when the bundle asks for it

use std::sync::Arc;

use stackfleet_compose::{BundleDescriptor, BundleRef, ContainerRuntime};
use tracing::{info, instrument};

use crate::config::DeploymentOptions;
use crate::error::{CoreError, DeployStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    Pull,
    Build,
}

impl std::fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProvisionStep::Pull => "pull",
            ProvisionStep::Build => "build",
        })
    }
}

impl ProvisionStep {
    fn deploy_step(self) -> DeployStep {
        match self {
            ProvisionStep::Pull => DeployStep::Pull,
            ProvisionStep::Build => DeployStep::Build,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Turned off by `--skip-pull` / `--skip-build`
    Disabled,
    /// No service in the bundle has a build directive
    NothingToBuild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: ProvisionStep,
    pub status: StepStatus,
}

/// Decide which steps run for `bundle`. Nothing to build wins over `skip_build`.
#[must_use]
pub fn plan(bundle: &BundleDescriptor, options: &DeploymentOptions) -> [StepOutcome; 2] {
    let pull = if options.skip_pull {
        StepStatus::Skipped(SkipReason::Disabled)
    } else {
        StepStatus::Completed
    };
    let build = if !bundle.has_build_directive() {
        StepStatus::Skipped(SkipReason::NothingToBuild)
    } else if options.skip_build {
        StepStatus::Skipped(SkipReason::Disabled)
    } else {
        StepStatus::Completed
    };
    [
        StepOutcome {
            step: ProvisionStep::Pull,
            status: pull,
        },
        StepOutcome {
            step: ProvisionStep::Build,
            status: build,
        },
    ]
}

/// Fetches and builds the images a bundle needs before it starts
pub struct ImageProvisioner {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ImageProvisioner {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Run the planned steps in order; the first failure stops the pipeline.
    ///
    /// # Errors
    /// Pull or build step failure
    #[instrument(skip_all, fields(project = %bundle.project))]
    pub async fn provision(
        &self,
        bundle: &BundleRef,
        descriptor: &BundleDescriptor,
        options: &DeploymentOptions,
    ) -> Result<[StepOutcome; 2], CoreError> {
        let steps = plan(descriptor, options);
        for outcome in &steps {
            if outcome.status != StepStatus::Completed {
                info!(step = ?outcome.step, status = ?outcome.status, "skipping");
                continue;
            }
            let result = match outcome.step {
                ProvisionStep::Pull => self.runtime.pull(bundle).await,
                ProvisionStep::Build => {
                    info!(services = ?descriptor.build_services(), "building images");
                    self.runtime.build(bundle).await
                }
            };
            result.map_err(|e| CoreError::step(outcome.step.deploy_step(), e))?;
        }
        Ok(steps)
    }
}
