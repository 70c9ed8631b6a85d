//! stackfleet-compose: container runtime abstraction
//!
//! Drives a machine's service bundle (a docker compose file) and the shared
//! container networks through a `RemoteExecutor`.

pub mod bundle;
pub mod docker;
pub mod error;
pub mod traits;
pub mod types;

pub use bundle::BundleDescriptor;
pub use docker::DockerCompose;
pub use error::ComposeError;
pub use traits::ContainerRuntime;
pub use types::{
    BundleRef, ComposeFlavor, ContainerHealth, ContainerState, NetworkCreation, NetworkSpec,
    ServiceState,
};
