//! Fleet health: registry snapshot first, direct probes as the fallback

pub mod aggregator;
pub mod probe;
pub mod table;

pub use aggregator::{
    HealthAggregator, HealthReport, HealthScope, HealthTotals, MachineProbeResults, ProbeResult,
    RegistrySummary, SnapshotSource,
};
pub use probe::{DirectProber, ProbeStatus, ProbeTarget, Prober};
pub use table::{DirectProbeTable, ProbeEntry};
