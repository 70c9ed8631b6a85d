//! Direct reachability probes

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::net::TcpStream;
use tracing::debug;

/// What to check for one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    /// Healthy on any 2xx response
    Http(String),
    /// Healthy when a TCP connection opens
    Tcp { host: String, port: u16 },
}

impl std::fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeTarget::Http(url) => f.write_str(url),
            ProbeTarget::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Healthy,
    /// Reason the probe failed
    Unhealthy(String),
}

impl ProbeStatus {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeStatus::Healthy)
    }
}

#[async_trait]
pub trait Prober: Send + Sync {
    /// Check `target` once. Timeouts and errors are reported as unhealthy.
    async fn probe(&self, target: &ProbeTarget) -> ProbeStatus;
}

/// Probes over the network with a per-probe timeout
pub struct DirectProber {
    client: Client,
    timeout: Duration,
}

impl DirectProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }

    async fn probe_http(&self, url: &str) -> ProbeStatus {
        match self.client.get(url).timeout(self.timeout).send().await {
            Ok(resp) if resp.status().is_success() => ProbeStatus::Healthy,
            Ok(resp) => ProbeStatus::Unhealthy(format!("HTTP {}", resp.status())),
            Err(e) if e.is_timeout() => ProbeStatus::Unhealthy("timed out".to_string()),
            Err(e) if e.is_connect() => ProbeStatus::Unhealthy("connection refused".to_string()),
            Err(e) => ProbeStatus::Unhealthy(e.to_string()),
        }
    }

    async fn probe_tcp(&self, host: &str, port: u16) -> ProbeStatus {
        match tokio::time::timeout(self.timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => ProbeStatus::Healthy,
            Ok(Err(e)) => ProbeStatus::Unhealthy(e.to_string()),
            Err(_) => ProbeStatus::Unhealthy("timed out".to_string()),
        }
    }
}

#[async_trait]
impl Prober for DirectProber {
    async fn probe(&self, target: &ProbeTarget) -> ProbeStatus {
        let status = match target {
            ProbeTarget::Http(url) => self.probe_http(url).await,
            ProbeTarget::Tcp { host, port } => self.probe_tcp(host, *port).await,
        };
        debug!(%target, ?status, "probe finished");
        status
    }
}
