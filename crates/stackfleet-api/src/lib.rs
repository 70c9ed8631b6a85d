//! stackfleet-api: service registry wire types
//!
//! Shapes of the registry's HTTP documents, shared by the client, the
//! health aggregator and the registrar.

pub mod requests;
pub mod responses;

pub use requests::RegisterServiceRequest;
pub use responses::{
    HealthStatus, MessageResponse, RegistryHealth, RegistrySnapshot, ServiceHealthRecord,
};
