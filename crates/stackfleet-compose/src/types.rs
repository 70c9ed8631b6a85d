//! Type definitions for bundles, containers and networks

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ComposeError;

/// Identifies one machine's bundle to the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRef {
    /// Compose project name, unique per machine
    pub project: String,
    /// Path to the compose file
    pub compose_file: PathBuf,
    /// Environment file used for variable interpolation
    pub env_file: PathBuf,
}

/// Container lifecycle state as reported by `compose ps`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Restarting,
    Paused,
    Removing,
    Exited,
    Dead,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Restarting => "restarting",
            ContainerState::Paused => "paused",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
            ContainerState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Healthcheck result for containers that declare one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerHealth {
    Starting,
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for ContainerHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContainerHealth::Starting => "starting",
            ContainerHealth::Healthy => "healthy",
            ContainerHealth::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

/// One row of `compose ps`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceState {
    /// Service name from the bundle
    pub service: String,
    /// Container name
    pub container: String,
    pub state: ContainerState,
    /// `None` when the service declares no healthcheck
    pub health: Option<ContainerHealth>,
    /// Human readable status column, e.g. "Up 3 minutes (healthy)"
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsRow {
    service: String,
    #[serde(default)]
    name: String,
    state: ContainerState,
    #[serde(default)]
    health: String,
    #[serde(default)]
    status: String,
}

impl From<PsRow> for ServiceState {
    fn from(row: PsRow) -> Self {
        let health = match row.health.as_str() {
            "starting" => Some(ContainerHealth::Starting),
            "healthy" => Some(ContainerHealth::Healthy),
            "unhealthy" => Some(ContainerHealth::Unhealthy),
            _ => None,
        };
        Self {
            service: row.service,
            container: row.name,
            state: row.state,
            health,
            status: row.status,
        }
    }
}

/// Parse `compose ps --format json` output.
///
/// Older compose releases print one JSON array, newer ones print one object
/// per line; both are accepted. Empty output means no containers.
///
/// # Errors
/// Returns `ComposeError::ParseError` on malformed JSON
pub fn parse_ps_output(output: &str) -> Result<Vec<ServiceState>, ComposeError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<PsRow> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|e| ComposeError::ParseError(e.to_string()))?
    } else {
        trimmed
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()
            .map_err(|e| ComposeError::ParseError(e.to_string()))?
    };

    Ok(rows.into_iter().map(ServiceState::from).collect())
}

/// A shared container network with fixed addressing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    /// CIDR, e.g. `172.28.0.0/16`
    pub subnet: String,
    pub gateway: String,
}

/// Result of a create-if-missing network call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkCreation {
    Created,
    AlreadyExists,
}

/// Which compose CLI is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeFlavor {
    /// `docker compose` plugin
    V2,
    /// standalone `docker-compose`
    V1,
}

impl ComposeFlavor {
    #[must_use]
    pub fn command(self) -> &'static str {
        match self {
            ComposeFlavor::V2 => "docker compose",
            ComposeFlavor::V1 => "docker-compose",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ndjson() {
        let output = r#"{"Service":"postgres","Name":"core-db-postgres-1","State":"running","Health":"healthy","Status":"Up 2 minutes (healthy)"}
{"Service":"redis","Name":"core-db-redis-1","State":"running","Health":"","Status":"Up 2 minutes"}
"#;
        let states = parse_ps_output(output).unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].service, "postgres");
        assert_eq!(states[0].health, Some(ContainerHealth::Healthy));
        assert_eq!(states[1].health, None);
        assert_eq!(states[1].state, ContainerState::Running);
    }

    #[test]
    fn test_parse_array_with_unknown_state() {
        let output = r#"[{"Service":"minio","Name":"m","State":"frozen","Health":"starting"}]"#;
        let states = parse_ps_output(output).unwrap();
        assert_eq!(states[0].state, ContainerState::Unknown);
        assert_eq!(states[0].health, Some(ContainerHealth::Starting));
        assert_eq!(states[0].status, "");
    }

    #[test]
    fn test_parse_empty_and_garbage() {
        assert!(parse_ps_output("  \n").unwrap().is_empty());
        assert!(matches!(
            parse_ps_output("NAME IMAGE"),
            Err(ComposeError::ParseError(_))
        ));
    }
}
