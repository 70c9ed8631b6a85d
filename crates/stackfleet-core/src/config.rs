//! Configuration types for deployments, health checks and fleet rollouts
//!
//! `Settings` is loaded once at process entry and handed to every component;
//! nothing below reads the process environment on its own.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stackfleet_compose::NetworkSpec;

use crate::error::CoreError;

/// What to do with a machine's bundle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeployAction {
    #[default]
    Deploy,
    Stop,
    Restart,
    Status,
    Logs,
}

impl DeployAction {
    pub const ALL: [DeployAction; 5] = [
        DeployAction::Deploy,
        DeployAction::Stop,
        DeployAction::Restart,
        DeployAction::Status,
        DeployAction::Logs,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeployAction::Deploy => "deploy",
            DeployAction::Stop => "stop",
            DeployAction::Restart => "restart",
            DeployAction::Status => "status",
            DeployAction::Logs => "logs",
        }
    }
}

impl FromStr for DeployAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeployAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| CoreError::UnknownAction(s.to_string()))
    }
}

impl std::fmt::Display for DeployAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-invocation switches for the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentOptions {
    /// Environment file passed to compose; must exist
    pub env_file: PathBuf,
    /// Replace a running bundle without asking
    pub force: bool,
    pub skip_pull: bool,
    pub skip_build: bool,
}

impl Default for DeploymentOptions {
    fn default() -> Self {
        Self {
            env_file: PathBuf::from(".env"),
            force: false,
            skip_pull: false,
            skip_build: false,
        }
    }
}

/// Top-level settings file (`stackfleet.toml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub deploy: DeploySettings,
    pub registry: RegistrySettings,
    pub probe: ProbeSettings,
    pub fleet: FleetSettings,
}

/// `[deploy]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    /// Checkout holding `stacks/` and `config/`; relative paths resolve against it
    pub root: PathBuf,
    /// Data, log and temp roots created for every machine
    pub base_dirs: Vec<PathBuf>,
    /// Shared container networks
    pub networks: Vec<NetworkSpec>,
    /// Fallback when the environment file does not set `DOMAIN`
    pub domain: Option<String>,
    /// Wait before the post-deploy status check
    pub grace_period_secs: u64,
    /// Lines of history shown by the `logs` action
    pub log_tail: u32,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            base_dirs: ["data", "logs", "tmp"].into_iter().map(PathBuf::from).collect(),
            networks: vec![
                NetworkSpec {
                    name: "stackfleet-frontend".to_string(),
                    subnet: "172.28.0.0/16".to_string(),
                    gateway: "172.28.0.1".to_string(),
                },
                NetworkSpec {
                    name: "stackfleet-backend".to_string(),
                    subnet: "172.29.0.0/16".to_string(),
                    gateway: "172.29.0.1".to_string(),
                },
            ],
            domain: None,
            grace_period_secs: 10,
            log_tail: 100,
        }
    }
}

impl DeploySettings {
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Resolve `path` against `root` unless it is absolute
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

/// `[registry]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Registration attempts per service
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8090".to_string(),
            api_key: None,
            timeout_secs: 5,
            max_retries: 5,
            retry_delay_secs: 5,
        }
    }
}

impl RegistrySettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// `[probe]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub timeout_secs: u64,
    /// Machine id to hostname; unlisted machines are reached by their id
    pub hosts: HashMap<String, String>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            hosts: HashMap::new(),
        }
    }
}

impl ProbeSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[fleet]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetSettings {
    /// Machines deployed together; each group finishes before the next starts
    pub phases: Vec<Vec<String>>,
    pub command_timeout_secs: u64,
    #[serde(rename = "host")]
    pub hosts: Vec<HostConfig>,
}

impl Default for FleetSettings {
    fn default() -> Self {
        let phase = |ids: &[&str]| ids.iter().map(ToString::to_string).collect();
        Self {
            phases: vec![
                phase(&["core-db"]),
                phase(&["inference-nvidia", "inference-amd"]),
                phase(&["edge-gateway"]),
                phase(&["monitoring"]),
            ],
            command_timeout_secs: 1800,
            hosts: Vec::new(),
        }
    }
}

impl FleetSettings {
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// `[[fleet.host]]`: where a machine's bundle runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Machine id deployed on this host
    pub machine: String,
    /// Address for SSH; `localhost` runs commands in-process
    pub addr: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Key path, `env:VAR`, or unset for ssh-agent
    pub ssh_key: Option<String>,
    /// Checkout of this repository on the host
    #[serde(default = "default_workdir")]
    pub workdir: String,
    #[serde(default = "default_deploy_bin")]
    pub deploy_bin: String,
}

fn default_user() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_workdir() -> String {
    "/opt/stackfleet".to_string()
}

fn default_deploy_bin() -> String {
    "deploy".to_string()
}

impl HostConfig {
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self.addr.as_str(), "localhost" | "127.0.0.1" | "::1")
    }
}

/// Read `KEY=VALUE` pairs from an environment file without touching the process environment
///
/// # Errors
/// `MissingEnvFile` if absent, `ConfigError` if a line cannot be parsed
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, CoreError> {
    if !path.is_file() {
        return Err(CoreError::MissingEnvFile(path.to_path_buf()));
    }
    dotenvy::from_path_iter(path)
        .and_then(|vars| vars.collect::<Result<HashMap<_, _>, _>>())
        .map_err(|e| CoreError::ConfigError(format!("{}: {e}", path.display())))
}
