//! One-shot registration of services with the registry

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use stackfleet_api::{MessageResponse, RegisterServiceRequest, RegistryHealth};
use stackfleet_client::{ClientError, RegistryClient};
use tracing::{error, info, warn};

use crate::config::RegistrySettings;
use crate::error::CoreError;

/// The registry endpoints the registrar writes through
#[async_trait]
pub trait RegistryWriter: Send + Sync {
    async fn health(&self) -> Result<RegistryHealth, ClientError>;

    async fn register_service(
        &self,
        service: &RegisterServiceRequest,
    ) -> Result<MessageResponse, ClientError>;

    /// Where the registry lives, for messages
    fn location(&self) -> String;
}

#[async_trait]
impl RegistryWriter for RegistryClient {
    async fn health(&self) -> Result<RegistryHealth, ClientError> {
        RegistryClient::health(self).await
    }

    async fn register_service(
        &self,
        service: &RegisterServiceRequest,
    ) -> Result<MessageResponse, ClientError> {
        RegistryClient::register_service(self, service).await
    }

    fn location(&self) -> String {
        self.base_url().to_string()
    }
}

/// Services read from a `SERVICES` document
#[derive(Debug, Clone, Default)]
pub struct ServiceList {
    pub services: Vec<RegisterServiceRequest>,
    /// Entries dropped because they were not objects or lacked name, host or port
    pub skipped: usize,
}

/// Parse a JSON array of service definitions, skipping malformed entries.
///
/// # Errors
/// `ConfigError` if `json` is not a JSON array
pub fn parse_services(json: &str) -> Result<ServiceList, CoreError> {
    let entries: Vec<Value> = serde_json::from_str(json)
        .map_err(|e| CoreError::ConfigError(format!("invalid SERVICES JSON: {e}")))?;

    let mut list = ServiceList::default();
    for entry in entries {
        let complete = entry.as_object().is_some_and(|obj| {
            ["name", "host", "port"]
                .iter()
                .all(|key| obj.contains_key(*key))
        });
        if !complete {
            error!(%entry, "service missing required fields (name, host, port)");
            list.skipped += 1;
            continue;
        }
        match serde_json::from_value::<RegisterServiceRequest>(entry) {
            Ok(service) => list.services.push(service),
            Err(e) => {
                error!(error = %e, "invalid service configuration");
                list.skipped += 1;
            }
        }
    }
    Ok(list)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationSummary {
    pub registered: Vec<String>,
    pub failed: Vec<String>,
}

impl RegistrationSummary {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Registers services once the registry answers its health check
pub struct ServiceRegistrar {
    writer: Arc<dyn RegistryWriter>,
    max_retries: u32,
    retry_delay: Duration,
}

impl ServiceRegistrar {
    pub fn new(writer: Arc<dyn RegistryWriter>, settings: &RegistrySettings) -> Self {
        Self {
            writer,
            max_retries: settings.max_retries.max(1),
            retry_delay: settings.retry_delay(),
        }
    }

    /// Poll the registry's health endpoint, up to twice the registration retry budget.
    pub async fn wait_for_registry(&self) -> bool {
        let attempts = self.max_retries.saturating_mul(2);
        info!(registry = %self.writer.location(), "waiting for service registry");
        for attempt in 1..=attempts {
            match self.writer.health().await {
                Ok(_) => {
                    info!("service registry is available");
                    return true;
                }
                Err(e) => warn!(attempt, attempts, error = %e, "registry not ready"),
            }
            if attempt < attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        false
    }

    async fn register_one(&self, service: &RegisterServiceRequest) -> bool {
        for attempt in 1..=self.max_retries {
            info!(service = %service.name, attempt, max = self.max_retries, "registering");
            match self.writer.register_service(service).await {
                Ok(_) => {
                    info!(service = %service.name, "registered");
                    return true;
                }
                Err(e) => warn!(service = %service.name, error = %e, "registration failed"),
            }
            if attempt < self.max_retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        false
    }

    /// Wait for the registry, then register every service in order.
    ///
    /// An empty list returns immediately without contacting the registry.
    ///
    /// # Errors
    /// `RegistryUnavailable` if the registry never answered its health check
    pub async fn register_all(
        &self,
        services: &[RegisterServiceRequest],
    ) -> Result<RegistrationSummary, CoreError> {
        let mut summary = RegistrationSummary::default();
        if services.is_empty() {
            warn!("no services to register");
            return Ok(summary);
        }
        if !self.wait_for_registry().await {
            return Err(CoreError::RegistryUnavailable(self.writer.location()));
        }

        for service in services {
            if self.register_one(service).await {
                summary.registered.push(service.name.clone());
            } else {
                summary.failed.push(service.name.clone());
            }
        }
        info!(
            registered = summary.registered.len(),
            total = services.len(),
            "registration complete"
        );
        Ok(summary)
    }
}
