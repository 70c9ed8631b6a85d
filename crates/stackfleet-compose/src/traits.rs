//! Container runtime trait

use async_trait::async_trait;

use crate::error::ComposeError;
use crate::types::{BundleRef, NetworkCreation, NetworkSpec, ServiceState};

/// Operations the orchestrator needs from the container runtime.
///
/// Every call queries or mutates live runtime state; nothing is cached
/// between calls apart from the detected tool flavour.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Whether the compose tooling is installed
    async fn is_available(&self) -> bool;

    /// Services of the bundle whose containers are currently running
    async fn running_services(&self, bundle: &BundleRef) -> Result<Vec<String>, ComposeError>;

    /// Pull every image the bundle references
    async fn pull(&self, bundle: &BundleRef) -> Result<(), ComposeError>;

    /// Build images for services with inline build instructions
    async fn build(&self, bundle: &BundleRef) -> Result<(), ComposeError>;

    /// Start the bundle in the background; returns without waiting for readiness
    async fn up(&self, bundle: &BundleRef) -> Result<(), ComposeError>;

    /// Stop and remove the bundle's containers; a stopped bundle is a no-op
    async fn down(&self, bundle: &BundleRef) -> Result<(), ComposeError>;

    /// Restart every service of the bundle
    async fn restart(&self, bundle: &BundleRef) -> Result<(), ComposeError>;

    /// Per-service container state and health
    async fn service_states(&self, bundle: &BundleRef) -> Result<Vec<ServiceState>, ComposeError>;

    /// Follow the bundle's log output until the future is dropped
    async fn follow_logs(&self, bundle: &BundleRef, tail: u32) -> Result<(), ComposeError>;

    /// Whether a container network with this name exists
    async fn network_exists(&self, name: &str) -> Result<bool, ComposeError>;

    /// Create a container network; an existing network is not an error
    async fn create_network(&self, spec: &NetworkSpec) -> Result<NetworkCreation, ComposeError>;

    /// Short backend name for logs
    fn runtime_type(&self) -> &'static str;
}
