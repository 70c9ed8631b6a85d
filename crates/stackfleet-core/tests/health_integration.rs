use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use stackfleet_api::{HealthStatus, RegistrySnapshot};
use stackfleet_client::{ClientError, RegistryClient};
use stackfleet_core::health::{
    HealthAggregator, HealthReport, HealthScope, MachineProbeResults, ProbeStatus, ProbeTarget,
    Prober, SnapshotSource,
};
use stackfleet_core::{DirectProbeTable, MachineId};

/// Healthy for TCP targets, unhealthy for HTTP; remembers what was probed
#[derive(Default)]
struct RecordingProber {
    probed: Mutex<Vec<String>>,
}

#[async_trait]
impl Prober for RecordingProber {
    async fn probe(&self, target: &ProbeTarget) -> ProbeStatus {
        self.probed.lock().unwrap().push(target.to_string());
        match target {
            ProbeTarget::Tcp { .. } => ProbeStatus::Healthy,
            ProbeTarget::Http(_) => ProbeStatus::Unhealthy("connection refused".to_string()),
        }
    }
}

struct UnreachableRegistry {
    calls: AtomicUsize,
}

#[async_trait]
impl SnapshotSource for UnreachableRegistry {
    async fn fetch_snapshot(&self) -> Result<RegistrySnapshot, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ClientError::Timeout)
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

fn aggregator(source: Arc<dyn SnapshotSource>, prober: Arc<RecordingProber>) -> HealthAggregator {
    HealthAggregator::new(source, prober, DirectProbeTable::standard(&HashMap::new()))
}

fn probed_machines(machines: &[MachineProbeResults]) -> Vec<MachineId> {
    machines.iter().map(|m| m.machine).collect()
}

#[tokio::test]
async fn test_registry_snapshot_with_null_status() {
    let app = Router::new().route(
        "/services",
        get(|| async {
            Json(json!({"services": [
                {"name": "db", "host": "h", "port": 1, "status": "healthy", "response_time": 12},
                {"name": "cache", "host": "h2", "port": 2, "status": null, "response_time": 5}
            ]}))
        }),
    );
    let addr = serve(app).await;
    let client =
        RegistryClient::with_timeout(format!("http://{addr}"), Duration::from_secs(2)).unwrap();
    let prober = Arc::new(RecordingProber::default());

    let report = aggregator(Arc::new(client), prober.clone())
        .check(HealthScope::All)
        .await;

    let HealthReport::FromRegistry(summary) = report else {
        panic!("expected registry path");
    };
    assert_eq!(summary.records[0].status, HealthStatus::Healthy);
    assert_eq!(summary.records[0].response_time_secs, Some(12.0));
    assert_eq!(summary.records[1].status, HealthStatus::Unknown);
    assert_eq!(
        summary.totals.to_string(),
        "Total: 2, Healthy: 1, Unhealthy: 0, Unknown: 1"
    );
    assert!(prober.probed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_totals_hold_for_mixed_statuses() {
    let app = Router::new().route(
        "/services",
        get(|| async {
            let services: Vec<Value> = ["healthy", "unhealthy", "unknown", "degraded"]
                .iter()
                .enumerate()
                .map(|(i, s)| json!({"name": format!("svc{i}"), "host": "h", "port": 80, "status": s}))
                .chain(std::iter::once(json!({"name": "bare", "host": "h", "port": 81})))
                .collect();
            Json(json!({ "services": services }))
        }),
    );
    let addr = serve(app).await;
    let client = RegistryClient::new(format!("http://{addr}")).unwrap();

    let HealthReport::FromRegistry(summary) =
        aggregator(Arc::new(client), Arc::new(RecordingProber::default()))
            .check(HealthScope::All)
            .await
    else {
        panic!("expected registry path");
    };
    let t = summary.totals;
    assert_eq!(t.total, 5);
    assert_eq!(t.total, t.healthy + t.unhealthy + t.unknown);
    assert_eq!((t.healthy, t.unhealthy, t.unknown), (1, 1, 3));
}

#[tokio::test]
async fn test_registry_timeout_falls_back_to_fleet_probes() {
    let app = Router::new().route(
        "/services",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"services": []}))
        }),
    );
    let addr = serve(app).await;
    let client =
        RegistryClient::with_timeout(format!("http://{addr}"), Duration::from_millis(200)).unwrap();
    let prober = Arc::new(RecordingProber::default());

    let report = aggregator(Arc::new(client), prober.clone())
        .check(HealthScope::All)
        .await;

    let HealthReport::FromDirectProbe {
        machines,
        fallback_notice,
    } = report
    else {
        panic!("expected fallback");
    };
    assert!(fallback_notice.is_some_and(|n| n.contains("falling back")));
    assert_eq!(probed_machines(&machines), MachineId::FLEET.to_vec());

    let core = &machines[0];
    assert_eq!(core.results[0].service, "postgres");
    assert!(core.results[0].status.is_healthy());
    assert!(!core.results[2].status.is_healthy());
}

#[tokio::test]
async fn test_fallback_probes_same_machines_regardless_of_registry() {
    let source = Arc::new(UnreachableRegistry {
        calls: AtomicUsize::new(0),
    });
    let prober = Arc::new(RecordingProber::default());
    let agg = aggregator(source.clone(), prober.clone());

    let HealthReport::FromDirectProbe { machines, .. } = agg.check(HealthScope::All).await else {
        panic!("expected fallback");
    };
    assert_eq!(probed_machines(&machines), MachineId::FLEET.to_vec());
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    let probed = prober.probed.lock().unwrap().clone();
    assert_eq!(probed.len(), 4 + 2 + 2 + 3 + 3);
    assert!(!probed.iter().any(|t| t.contains("localhost")));
}

#[tokio::test]
async fn test_single_machine_skips_registry() {
    let source = Arc::new(UnreachableRegistry {
        calls: AtomicUsize::new(0),
    });
    let prober = Arc::new(RecordingProber::default());

    let report = aggregator(source.clone(), prober.clone())
        .check("inference-amd".parse().unwrap())
        .await;

    let HealthReport::FromDirectProbe {
        machines,
        fallback_notice,
    } = report
    else {
        panic!("expected direct probes");
    };
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert!(fallback_notice.is_none());
    assert_eq!(probed_machines(&machines), vec![MachineId::InferenceAmd]);
    assert_eq!(
        *prober.probed.lock().unwrap(),
        vec![
            "http://inference-amd:11434/api/tags".to_string(),
            "http://inference-amd:8080/health".to_string(),
        ]
    );
}
