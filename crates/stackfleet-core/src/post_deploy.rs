//! Advisory checks after a bundle has been started

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use stackfleet_compose::{BundleRef, ContainerHealth, ContainerRuntime, ContainerState, ServiceState};
use tracing::{info, warn};

use crate::profile::MachineId;

/// Outcome of the post-deploy pass. Warnings never fail the deploy.
#[derive(Debug, Clone)]
pub struct PostDeployReport {
    pub machine: MachineId,
    pub checked_at: DateTime<Utc>,
    pub services: Vec<ServiceState>,
    pub warnings: Vec<String>,
    pub hints: &'static [&'static str],
}

impl PostDeployReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Operator reminders printed after a successful deploy
#[must_use]
pub fn operator_hints(machine: MachineId) -> &'static [&'static str] {
    match machine {
        MachineId::CoreDb => &[
            "Configure PostgreSQL replication and a backup schedule into backups/postgres",
            "Create MinIO buckets and access keys for dependent services",
            "Service registry listens on :8090; run register-services once the fleet is up",
        ],
        MachineId::InferenceNvidia => &[
            "Check GPU visibility with: docker exec <vllm container> nvidia-smi",
            "Pull Ollama models into models/ollama before first use",
        ],
        MachineId::InferenceAmd => &[
            "Check ROCm device access (/dev/kfd, /dev/dri) inside the containers",
            "Pull Ollama models into models/ollama-rocm before first use",
        ],
        MachineId::EdgeGateway => &[
            "Point DNS for the deployment domain at this machine",
            "Issue TLS certificates with certbot before enabling HTTPS server blocks",
        ],
        MachineId::Monitoring => &[
            "Grafana listens on :3000; change the admin password on first login",
            "Add scrape targets for new machines to config/prometheus/prometheus.yml.template",
        ],
        MachineId::LocalDev => &["Local stack is for development only; do not expose its ports"],
    }
}

/// Warning text for a service that is not settled, if any
fn service_warning(svc: &ServiceState) -> Option<String> {
    match (svc.health, svc.state) {
        (Some(ContainerHealth::Unhealthy), _) => Some(format!("{} is unhealthy", svc.service)),
        (Some(ContainerHealth::Starting), _) => {
            Some(format!("{} is still starting", svc.service))
        }
        (_, ContainerState::Restarting) => {
            Some(format!("{} keeps restarting ({})", svc.service, svc.status))
        }
        (_, ContainerState::Exited | ContainerState::Dead) => {
            Some(format!("{} is stopped ({})", svc.service, svc.status))
        }
        _ => None,
    }
}

/// Waits out a grace period then reports unsettled services
pub struct PostDeployChecker {
    runtime: Arc<dyn ContainerRuntime>,
    grace: Duration,
}

impl PostDeployChecker {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, grace: Duration) -> Self {
        Self { runtime, grace }
    }

    pub async fn check(&self, machine: MachineId, bundle: &BundleRef) -> PostDeployReport {
        info!(grace = ?self.grace, "waiting before post-deploy check");
        tokio::time::sleep(self.grace).await;

        let (services, mut warnings) = match self.runtime.service_states(bundle).await {
            Ok(services) => {
                let warnings = services.iter().filter_map(service_warning).collect();
                (services, warnings)
            }
            Err(e) => (Vec::new(), vec![format!("could not read service status: {e}")]),
        };
        if services.is_empty() && warnings.is_empty() {
            warnings.push("no containers reported for this bundle".to_string());
        }
        for w in &warnings {
            warn!(%machine, "{w}");
        }

        PostDeployReport {
            machine,
            checked_at: Utc::now(),
            services,
            warnings,
            hints: operator_hints(machine),
        }
    }
}
