//! HTTP client for the service registry

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use stackfleet_api::{MessageResponse, RegisterServiceRequest, RegistryHealth, RegistrySnapshot};

use crate::error::{ClientError, Result};

/// Header carrying the registry API key on mutating requests
const API_KEY_HEADER: &str = "X-API-Key";

/// Client for the fleet service registry
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl RegistryClient {
    /// Create a client with reqwest defaults (no request timeout)
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, Client::new())
    }

    /// Create a client whose requests and connects give up after `timeout`
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the TLS backend fails to initialise.
    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Self::with_client(base_url, client)
    }

    /// Create a client around a preconfigured `reqwest::Client`
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn with_client(base_url: impl AsRef<str>, client: Client) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        // keep any path prefix when joining relative endpoints
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client,
            base_url,
            api_key: None,
        })
    }

    /// Send `key` on mutating requests
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, message });
        }

        Ok(response.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        debug!(%url, "GET");
        self.send(self.client.get(url)).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &impl serde::Serialize) -> Result<T> {
        let url = self.url(path)?;
        debug!(%url, "POST");
        self.send(self.authorized(self.client.post(url).json(body)))
            .await
    }

    /// `GET /health` of the registry itself
    ///
    /// # Errors
    /// Returns an error if the registry is unreachable or unhealthy.
    pub async fn health(&self) -> Result<RegistryHealth> {
        self.get("health").await
    }

    /// `GET /services`: every registered service with its last known health.
    ///
    /// Each call is a fresh request; nothing is cached.
    ///
    /// # Errors
    /// Returns an error on any network, status or decoding failure.
    pub async fn fetch_snapshot(&self) -> Result<RegistrySnapshot> {
        self.get("services").await
    }

    /// `POST /services`: register or update a service
    ///
    /// # Errors
    /// Returns an error if the request fails or the registry rejects it.
    pub async fn register_service(
        &self,
        service: &RegisterServiceRequest,
    ) -> Result<MessageResponse> {
        self.post("services", service).await
    }
}
