//! Deployment state machine
//!
//! Runtime state is never stored: every action queries the container runtime
//! for what is actually running and acts on that.

use std::sync::Arc;

use async_trait::async_trait;
use stackfleet_compose::{BundleDescriptor, BundleRef, ContainerRuntime, ServiceState};
use tracing::{info, instrument, warn};

use crate::bootstrap::{DirectoryOutcome, DirectoryOwner, NetworkOutcome, ResourceBootstrapper};
use crate::config::{DeployAction, DeploySettings, DeploymentOptions, read_env_file};
use crate::error::{CoreError, DeployStep};
use crate::post_deploy::{PostDeployChecker, PostDeployReport};
use crate::profile::{MachineProfile, MachineProfileRegistry};
use crate::provision::{ImageProvisioner, StepOutcome};
use crate::template::{TemplateProcessor, resolve_domain};

/// Asks the operator before a running bundle is replaced
#[async_trait]
pub trait Confirmation: Send + Sync {
    /// `true` to go ahead
    async fn confirm(&self, prompt: &str) -> bool;
}

/// What a deploy did, step by step
#[derive(Debug, Clone)]
pub struct DeploySummary {
    pub directories: Vec<DirectoryOutcome>,
    pub networks: Vec<NetworkOutcome>,
    /// Rendered output paths
    pub rendered: Vec<std::path::PathBuf>,
    pub provision: [StepOutcome; 2],
    /// Services that were running and got replaced
    pub replaced: Vec<String>,
    pub report: PostDeployReport,
}

#[derive(Debug, Clone)]
pub enum ActionOutcome {
    Deployed(Box<DeploySummary>),
    /// Operator declined replacing the running bundle; nothing changed
    Cancelled { running: Vec<String> },
    Stopped,
    Restarted,
    Status(Vec<ServiceState>),
    LogsEnded,
}

/// Dispatches actions against one machine's bundle
pub struct Orchestrator {
    profiles: MachineProfileRegistry,
    settings: DeploySettings,
    runtime: Arc<dyn ContainerRuntime>,
    confirmation: Arc<dyn Confirmation>,
    owner: Option<DirectoryOwner>,
}

impl Orchestrator {
    pub fn new(
        settings: DeploySettings,
        runtime: Arc<dyn ContainerRuntime>,
        confirmation: Arc<dyn Confirmation>,
    ) -> Self {
        Self {
            profiles: MachineProfileRegistry::new(settings.root.clone()),
            settings,
            runtime,
            confirmation,
            owner: None,
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: Option<DirectoryOwner>) -> Self {
        self.owner = owner;
        self
    }

    /// Validate inputs, then run `action` against `machine`.
    ///
    /// Validation (machine, env file, tooling) finishes before anything is
    /// mutated. Mutating steps stop at the first failure and are not rolled back.
    ///
    /// # Errors
    /// See [`CoreError::kind`] for how failures are classified
    #[instrument(skip(self, options), fields(env = %options.env_file.display()))]
    pub async fn run(
        &self,
        machine: &str,
        action: DeployAction,
        options: &DeploymentOptions,
    ) -> Result<ActionOutcome, CoreError> {
        let profile = self.profiles.resolve(machine)?;
        let env = read_env_file(&options.env_file)?;
        if !self.runtime.is_available().await {
            return Err(CoreError::MissingTooling("docker compose".to_string()));
        }

        let bundle = profile.bundle_ref(&options.env_file);
        info!(runtime = self.runtime.runtime_type(), project = %bundle.project, "running {action}");

        match action {
            DeployAction::Deploy => {
                let domain = resolve_domain(&env, self.settings.domain.as_deref());
                self.deploy(&profile, &bundle, &domain, options).await
            }
            DeployAction::Stop => {
                self.runtime
                    .down(&bundle)
                    .await
                    .map_err(|e| CoreError::step(DeployStep::Stop, e))?;
                Ok(ActionOutcome::Stopped)
            }
            DeployAction::Restart => {
                self.runtime
                    .restart(&bundle)
                    .await
                    .map_err(|e| CoreError::step(DeployStep::Restart, e))?;
                Ok(ActionOutcome::Restarted)
            }
            DeployAction::Status => self
                .runtime
                .service_states(&bundle)
                .await
                .map(ActionOutcome::Status)
                .map_err(|e| CoreError::step(DeployStep::Status, e)),
            DeployAction::Logs => {
                self.runtime
                    .follow_logs(&bundle, self.settings.log_tail)
                    .await
                    .map_err(|e| CoreError::step(DeployStep::Logs, e))?;
                Ok(ActionOutcome::LogsEnded)
            }
        }
    }

    async fn deploy(
        &self,
        profile: &MachineProfile,
        bundle: &BundleRef,
        domain: &str,
        options: &DeploymentOptions,
    ) -> Result<ActionOutcome, CoreError> {
        let bootstrapper =
            ResourceBootstrapper::new(Arc::clone(&self.runtime)).with_owner(self.owner);
        let base_dirs: Vec<_> = self
            .settings
            .base_dirs
            .iter()
            .map(|d| self.settings.resolve(d))
            .collect();
        let directories = bootstrapper.ensure(profile, &base_dirs).await?;
        let networks = bootstrapper.ensure_networks(&self.settings.networks).await?;

        let processor = TemplateProcessor::new(domain);
        let mut rendered = Vec::with_capacity(profile.templates.len());
        for spec in &profile.templates {
            processor.render(&spec.template, &spec.output).await?;
            rendered.push(spec.output.clone());
        }

        let descriptor = BundleDescriptor::load(&profile.bundle_file)
            .await
            .map_err(|e| CoreError::step(DeployStep::Provision, e))?;
        let provision = ImageProvisioner::new(Arc::clone(&self.runtime))
            .provision(bundle, &descriptor, options)
            .await?;

        let running = self
            .runtime
            .running_services(bundle)
            .await
            .map_err(|e| CoreError::step(DeployStep::Start, e))?;

        if !running.is_empty() {
            if !options.force {
                let prompt = format!(
                    "{} has running services ({}). Stop and redeploy?",
                    profile.id,
                    running.join(", ")
                );
                if !self.confirmation.confirm(&prompt).await {
                    info!("deploy cancelled by operator");
                    return Ok(ActionOutcome::Cancelled { running });
                }
            }
            warn!(services = ?running, "stopping running bundle before redeploy");
            self.runtime
                .down(bundle)
                .await
                .map_err(|e| CoreError::step(DeployStep::Stop, e))?;
        }

        self.runtime
            .up(bundle)
            .await
            .map_err(|e| CoreError::step(DeployStep::Start, e))?;
        info!("bundle started");

        let report = PostDeployChecker::new(Arc::clone(&self.runtime), self.settings.grace_period())
            .check(profile.id, bundle)
            .await;

        Ok(ActionOutcome::Deployed(Box::new(DeploySummary {
            directories,
            networks,
            rendered,
            provision,
            replaced: running,
            report,
        })))
    }
}
