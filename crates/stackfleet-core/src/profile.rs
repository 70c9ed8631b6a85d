//! Static machine catalog and profile resolution

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use stackfleet_compose::BundleRef;

use crate::error::CoreError;

/// Every machine the fleet knows about. Adding a machine means adding a
/// variant, which forces the catalog match below to cover it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MachineId {
    CoreDb,
    InferenceNvidia,
    InferenceAmd,
    EdgeGateway,
    Monitoring,
    LocalDev,
}

impl MachineId {
    pub const ALL: [MachineId; 6] = [
        MachineId::CoreDb,
        MachineId::InferenceNvidia,
        MachineId::InferenceAmd,
        MachineId::EdgeGateway,
        MachineId::Monitoring,
        MachineId::LocalDev,
    ];

    /// Machines probed by the fleet-wide health fallback, in display order
    pub const FLEET: [MachineId; 5] = [
        MachineId::CoreDb,
        MachineId::InferenceNvidia,
        MachineId::InferenceAmd,
        MachineId::EdgeGateway,
        MachineId::Monitoring,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MachineId::CoreDb => "core-db",
            MachineId::InferenceNvidia => "inference-nvidia",
            MachineId::InferenceAmd => "inference-amd",
            MachineId::EdgeGateway => "edge-gateway",
            MachineId::Monitoring => "monitoring",
            MachineId::LocalDev => "local-dev",
        }
    }

    /// Comma separated list of valid ids, for error messages
    #[must_use]
    pub fn known_ids() -> String {
        Self::ALL.map(Self::as_str).join(", ")
    }
}

impl FromStr for MachineId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CoreError::UnknownMachine {
                id: s.to_string(),
                known: Self::known_ids(),
            })
    }
}

impl std::fmt::Display for MachineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware class a bundle is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComputeClass {
    Cpu,
    GpuNvidia,
    GpuAmd,
    Edge,
    Monitoring,
    Local,
}

/// A configuration template rendered during deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSpec {
    pub template: PathBuf,
    pub output: PathBuf,
}

/// Everything the orchestrator needs to know about one machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineProfile {
    pub id: MachineId,
    pub bundle_file: PathBuf,
    /// Created before every deploy, in order
    pub required_directories: Vec<PathBuf>,
    pub compute_class: ComputeClass,
    pub templates: Vec<TemplateSpec>,
}

impl MachineProfile {
    /// Runtime handle for this machine's bundle
    #[must_use]
    pub fn bundle_ref(&self, env_file: &Path) -> BundleRef {
        BundleRef {
            project: format!("stackfleet-{}", self.id),
            compose_file: self.bundle_file.clone(),
            env_file: env_file.to_path_buf(),
        }
    }
}

struct Definition {
    bundle: &'static str,
    dirs: &'static [&'static str],
    class: ComputeClass,
    templates: &'static [(&'static str, &'static str)],
}

fn definition(id: MachineId) -> Definition {
    match id {
        MachineId::CoreDb => Definition {
            bundle: "stacks/core-db/docker-compose.yml",
            dirs: &["data/postgres", "data/redis", "data/minio", "backups/postgres"],
            class: ComputeClass::Cpu,
            templates: &[],
        },
        MachineId::InferenceNvidia => Definition {
            bundle: "stacks/inference-nvidia/docker-compose.yml",
            dirs: &["models/huggingface", "models/ollama", "data/vllm-cache"],
            class: ComputeClass::GpuNvidia,
            templates: &[],
        },
        MachineId::InferenceAmd => Definition {
            bundle: "stacks/inference-amd/docker-compose.yml",
            dirs: &["models/huggingface", "models/ollama-rocm"],
            class: ComputeClass::GpuAmd,
            templates: &[],
        },
        MachineId::EdgeGateway => Definition {
            bundle: "stacks/edge-gateway/docker-compose.yml",
            dirs: &["data/nginx/cache", "data/certbot", "config/nginx/conf.d"],
            class: ComputeClass::Edge,
            templates: &[("config/nginx/nginx.conf.template", "config/nginx/nginx.conf")],
        },
        MachineId::Monitoring => Definition {
            bundle: "stacks/monitoring/docker-compose.yml",
            dirs: &["data/prometheus", "data/grafana", "data/loki"],
            class: ComputeClass::Monitoring,
            templates: &[
                (
                    "config/prometheus/prometheus.yml.template",
                    "config/prometheus/prometheus.yml",
                ),
                (
                    "config/grafana/datasources.yml.template",
                    "config/grafana/datasources.yml",
                ),
            ],
        },
        MachineId::LocalDev => Definition {
            bundle: "stacks/local-dev/docker-compose.yml",
            dirs: &["data/local"],
            class: ComputeClass::Local,
            templates: &[],
        },
    }
}

/// Resolves machine ids to profiles rooted at a repository checkout
#[derive(Debug, Clone)]
pub struct MachineProfileRegistry {
    root: PathBuf,
}

impl MachineProfileRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Build the profile for `id` without touching the filesystem
    #[must_use]
    pub fn profile(&self, id: MachineId) -> MachineProfile {
        let def = definition(id);
        MachineProfile {
            id,
            bundle_file: self.root.join(def.bundle),
            required_directories: def.dirs.iter().map(|d| self.root.join(d)).collect(),
            compute_class: def.class,
            templates: def
                .templates
                .iter()
                .map(|(template, output)| TemplateSpec {
                    template: self.root.join(template),
                    output: self.root.join(output),
                })
                .collect(),
        }
    }

    /// Resolve a machine id and check its bundle file is on disk.
    ///
    /// # Errors
    /// `UnknownMachine` for ids outside the catalog, `MissingBundleFile` when
    /// the bundle file does not exist
    pub fn resolve(&self, id: &str) -> Result<MachineProfile, CoreError> {
        let profile = self.profile(id.parse()?);
        if !profile.bundle_file.is_file() {
            return Err(CoreError::MissingBundleFile(profile.bundle_file));
        }
        Ok(profile)
    }
}
