//! Static probe targets per machine

use std::collections::HashMap;

use super::probe::ProbeTarget;
use crate::profile::MachineId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEntry {
    pub service: String,
    pub target: ProbeTarget,
}

/// Machine id to the services probed on it, in display order
#[derive(Debug, Clone, Default)]
pub struct DirectProbeTable {
    entries: HashMap<MachineId, Vec<ProbeEntry>>,
}

enum Check {
    Http(u16, &'static str),
    /// Port 80, no explicit port in the URL
    HttpDefault(&'static str),
    Tcp(u16),
}

fn checks(machine: MachineId) -> &'static [(&'static str, Check)] {
    match machine {
        MachineId::CoreDb => &[
            ("postgres", Check::Tcp(5432)),
            ("redis", Check::Tcp(6379)),
            ("minio", Check::Http(9000, "/minio/health/live")),
            ("service-registry", Check::Http(8090, "/health")),
        ],
        MachineId::InferenceNvidia => &[
            ("vllm", Check::Http(8000, "/health")),
            ("ollama", Check::Http(11434, "/api/tags")),
        ],
        MachineId::InferenceAmd => &[
            ("ollama-rocm", Check::Http(11434, "/api/tags")),
            ("llama-cpp", Check::Http(8080, "/health")),
        ],
        MachineId::EdgeGateway => &[
            ("nginx", Check::HttpDefault("/healthz")),
            ("context7", Check::Http(8101, "/health")),
            ("calculator", Check::Http(8102, "/health")),
        ],
        MachineId::Monitoring => &[
            ("prometheus", Check::Http(9090, "/-/healthy")),
            ("grafana", Check::Http(3000, "/api/health")),
            ("loki", Check::Http(3100, "/ready")),
        ],
        MachineId::LocalDev => &[("ollama", Check::Http(11434, "/api/tags"))],
    }
}

fn default_host(machine: MachineId) -> &'static str {
    match machine {
        MachineId::LocalDev => "localhost",
        other => other.as_str(),
    }
}

impl DirectProbeTable {
    /// The fleet's standard targets. `hosts` overrides the hostname per
    /// machine id; machines not listed are reached by their id.
    #[must_use]
    pub fn standard(hosts: &HashMap<String, String>) -> Self {
        let entries = MachineId::ALL
            .into_iter()
            .map(|machine| {
                let host = hosts
                    .get(machine.as_str())
                    .map_or(default_host(machine), String::as_str);
                let probes = checks(machine)
                    .iter()
                    .map(|(service, check)| ProbeEntry {
                        service: (*service).to_string(),
                        target: match check {
                            Check::Http(port, path) => {
                                ProbeTarget::Http(format!("http://{host}:{port}{path}"))
                            }
                            Check::HttpDefault(path) => {
                                ProbeTarget::Http(format!("http://{host}{path}"))
                            }
                            Check::Tcp(port) => ProbeTarget::Tcp {
                                host: host.to_string(),
                                port: *port,
                            },
                        },
                    })
                    .collect();
                (machine, probes)
            })
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self, machine: MachineId) -> &[ProbeEntry] {
        self.entries.get(&machine).map(Vec::as_slice).unwrap_or_default()
    }
}
