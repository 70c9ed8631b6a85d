//! Response types for the registry

use serde::{Deserialize, Deserializer, Serialize};

/// Health classification of a registered service.
///
/// The registry may send `"unknown"`, `null`, omit the field, or send a value
/// we do not recognise; all of those are `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Classify a raw status string
    #[must_use]
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw {
            Some("healthy") => HealthStatus::Healthy,
            Some("unhealthy") => HealthStatus::Unhealthy,
            _ => HealthStatus::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for HealthStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(HealthStatus::from_wire(raw.as_deref()))
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One entry of `GET /services`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealthRecord {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub status: HealthStatus,
    /// Seconds, as measured by the registry's last check
    #[serde(default, rename = "response_time")]
    pub response_time_secs: Option<f64>,
}

/// Body of `GET /services`, taken at a single point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub services: Vec<ServiceHealthRecord>,
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryHealth {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

/// Acknowledgement returned by mutating endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
