//! Two-path health aggregation

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use stackfleet_api::{HealthStatus, RegistrySnapshot, ServiceHealthRecord};
use stackfleet_client::{ClientError, RegistryClient};
use tracing::{info, warn};

use super::probe::{ProbeStatus, ProbeTarget, Prober};
use super::table::DirectProbeTable;
use crate::error::CoreError;
use crate::profile::MachineId;

/// Where registry snapshots come from
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<RegistrySnapshot, ClientError>;
}

#[async_trait]
impl SnapshotSource for RegistryClient {
    async fn fetch_snapshot(&self) -> Result<RegistrySnapshot, ClientError> {
        RegistryClient::fetch_snapshot(self).await
    }
}

/// Fleet-wide view or a single machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HealthScope {
    #[default]
    All,
    Machine(MachineId),
}

impl FromStr for HealthScope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(HealthScope::All)
        } else {
            s.parse().map(HealthScope::Machine)
        }
    }
}

/// Counts over one snapshot; `total == healthy + unhealthy + unknown`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthTotals {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub unknown: usize,
}

impl HealthTotals {
    #[must_use]
    pub fn from_records(records: &[ServiceHealthRecord]) -> Self {
        records.iter().fold(Self::default(), |mut totals, record| {
            totals.total += 1;
            match record.status {
                HealthStatus::Healthy => totals.healthy += 1,
                HealthStatus::Unhealthy => totals.unhealthy += 1,
                HealthStatus::Unknown => totals.unknown += 1,
            }
            totals
        })
    }
}

impl std::fmt::Display for HealthTotals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Total: {}, Healthy: {}, Unhealthy: {}, Unknown: {}",
            self.total, self.healthy, self.unhealthy, self.unknown
        )
    }
}

#[derive(Debug, Clone)]
pub struct RegistrySummary {
    pub records: Vec<ServiceHealthRecord>,
    pub totals: HealthTotals,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub service: String,
    pub target: ProbeTarget,
    pub status: ProbeStatus,
}

/// Direct probe results for one machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineProbeResults {
    pub machine: MachineId,
    pub results: Vec<ProbeResult>,
}

#[derive(Debug, Clone)]
pub enum HealthReport {
    FromRegistry(RegistrySummary),
    FromDirectProbe {
        machines: Vec<MachineProbeResults>,
        /// Set when the registry was tried and failed
        fallback_notice: Option<String>,
    },
}

/// Reports fleet health from the registry, or by probing machines directly
pub struct HealthAggregator {
    source: Arc<dyn SnapshotSource>,
    prober: Arc<dyn Prober>,
    table: DirectProbeTable,
}

impl HealthAggregator {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        prober: Arc<dyn Prober>,
        table: DirectProbeTable,
    ) -> Self {
        Self {
            source,
            prober,
            table,
        }
    }

    /// Evaluate health once for `scope`.
    ///
    /// A single machine is always probed directly. The fleet-wide view asks
    /// the registry and falls back to probing [`MachineId::FLEET`] when the
    /// registry cannot be reached or answers garbage.
    pub async fn check(&self, scope: HealthScope) -> HealthReport {
        match scope {
            HealthScope::Machine(machine) => HealthReport::FromDirectProbe {
                machines: vec![self.probe_machine(machine).await],
                fallback_notice: None,
            },
            HealthScope::All => match self.source.fetch_snapshot().await {
                Ok(snapshot) => {
                    let totals = HealthTotals::from_records(&snapshot.services);
                    info!(total = totals.total, "registry snapshot received");
                    HealthReport::FromRegistry(RegistrySummary {
                        records: snapshot.services,
                        totals,
                    })
                }
                Err(e) => {
                    warn!(error = %e, "registry unreachable, probing machines directly");
                    let mut machines = Vec::with_capacity(MachineId::FLEET.len());
                    for machine in MachineId::FLEET {
                        machines.push(self.probe_machine(machine).await);
                    }
                    HealthReport::FromDirectProbe {
                        machines,
                        fallback_notice: Some(format!(
                            "service registry unavailable ({e}), falling back to direct probes"
                        )),
                    }
                }
            },
        }
    }

    async fn probe_machine(&self, machine: MachineId) -> MachineProbeResults {
        let mut results = Vec::new();
        for entry in self.table.entries(machine) {
            results.push(ProbeResult {
                service: entry.service.clone(),
                target: entry.target.clone(),
                status: self.prober.probe(&entry.target).await,
            });
        }
        MachineProbeResults { machine, results }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, status: HealthStatus) -> ServiceHealthRecord {
        ServiceHealthRecord {
            name: name.to_string(),
            host: "h".to_string(),
            port: 1,
            status,
            response_time_secs: None,
        }
    }

    #[test]
    fn test_totals_invariant() {
        let records = vec![
            record("a", HealthStatus::Healthy),
            record("b", HealthStatus::Unknown),
            record("c", HealthStatus::Unhealthy),
            record("d", HealthStatus::Healthy),
        ];
        let totals = HealthTotals::from_records(&records);
        assert_eq!(totals.total, totals.healthy + totals.unhealthy + totals.unknown);
        assert_eq!(
            totals.to_string(),
            "Total: 4, Healthy: 2, Unhealthy: 1, Unknown: 1"
        );
        assert_eq!(HealthTotals::from_records(&[]).total, 0);
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!("all".parse::<HealthScope>().unwrap(), HealthScope::All);
        assert_eq!(
            "monitoring".parse::<HealthScope>().unwrap(),
            HealthScope::Machine(MachineId::Monitoring)
        );
        assert!("everything".parse::<HealthScope>().is_err());
    }
}
