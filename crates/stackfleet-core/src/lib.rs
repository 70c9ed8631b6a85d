//! stackfleet-core: deployment orchestration and fleet health
//!
//! The orchestrator drives one machine's service bundle through
//! deploy/stop/restart/status/logs. The health aggregator reports fleet
//! health from the service registry, probing machines directly when the
//! registry is down. Fleet rollout and service registration build on both.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod fleet;
pub mod health;
pub mod orchestrator;
pub mod post_deploy;
pub mod profile;
pub mod provision;
pub mod registrar;
pub mod template;

pub use bootstrap::{DirectoryOutcome, DirectoryOwner, NetworkOutcome, ResourceBootstrapper};
pub use config::{
    DeployAction, DeploySettings, DeploymentOptions, FleetSettings, HostConfig, ProbeSettings,
    RegistrySettings, Settings, read_env_file,
};
pub use error::{CoreError, DeployStep, ErrorKind};
pub use fleet::{ExecutorFactory, FleetReport, FleetRollout, RolloutOptions, RolloutStatus};
pub use health::{DirectProbeTable, DirectProber, HealthAggregator, HealthReport, HealthScope};
pub use orchestrator::{ActionOutcome, Confirmation, DeploySummary, Orchestrator};
pub use post_deploy::{PostDeployChecker, PostDeployReport};
pub use profile::{ComputeClass, MachineId, MachineProfile, MachineProfileRegistry};
pub use provision::ImageProvisioner;
pub use registrar::{RegistrationSummary, RegistryWriter, ServiceRegistrar, parse_services};
pub use template::TemplateProcessor;
