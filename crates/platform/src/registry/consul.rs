use async_trait::async_trait;
use common::{ServiceAddress, ServiceRegistration};
use serde::{Deserialize, Serialize};

use super::ServiceRegistry;
use crate::{PlatformError, Result};

/// Registry backed by a Consul agent's HTTP API.
#[derive(Clone)]
pub struct ConsulRegistry {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentServiceRegistration<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    name: &'a str,
    address: &'a str,
    port: u16,
    tags: &'a [String],
    check: AgentServiceCheck<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentServiceCheck<'a> {
    #[serde(rename = "HTTP")]
    http: &'a str,
    interval: &'a str,
    timeout: &'a str,
    deregister_critical_service_after: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthServiceEntry {
    service: AgentService,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AgentService {
    #[serde(default)]
    address: String,
    port: u16,
}

impl ConsulRegistry {
    /// Creates a client for the agent at `base_url` (e.g. `http://consul:8500`).
    ///
    /// No request is made; use [`ConsulRegistry::connect`] to verify the agent.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Creates a client and checks that the agent answers.
    pub async fn connect(base_url: impl Into<String>) -> Result<Self> {
        let registry = Self::new(base_url);
        registry.ping().await?;
        tracing::info!(url = %registry.base_url, "connected to Consul");
        Ok(registry)
    }

    /// Queries the agent's own status.
    pub async fn ping(&self) -> Result<()> {
        self.client
            .get(format!("{}/v1/agent/self", self.base_url))
            .send()
            .await
            .map_err(|e| PlatformError::RegistryUnavailable(e.to_string()))?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl ServiceRegistry for ConsulRegistry {
    #[tracing::instrument(skip(self, registration), fields(service = %registration.name, id = %registration.id))]
    async fn register(&self, registration: &ServiceRegistration) -> Result<()> {
        let body = AgentServiceRegistration {
            id: &registration.id,
            name: &registration.name,
            address: &registration.address,
            port: registration.port,
            tags: &registration.tags,
            check: AgentServiceCheck {
                http: &registration.check.url,
                interval: &registration.check.interval,
                timeout: &registration.check.timeout,
                deregister_critical_service_after: &registration.check.deregister_after,
            },
        };

        let response = self
            .client
            .put(format!("{}/v1/agent/service/register", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::RegistryUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PlatformError::Registry(format!(
                "failed to register service: status {}",
                response.status()
            )));
        }

        tracing::info!(
            address = %registration.address,
            port = registration.port,
            "registered service"
        );
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn deregister(&self, service_id: &str) -> Result<()> {
        let response = self
            .client
            .put(format!(
                "{}/v1/agent/service/deregister/{service_id}",
                self.base_url
            ))
            .send()
            .await
            .map_err(|e| PlatformError::RegistryUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PlatformError::Registry(format!(
                "failed to deregister service: status {}",
                response.status()
            )));
        }

        tracing::info!("deregistered service");
        Ok(())
    }

    async fn lookup(&self, name: &str) -> Result<ServiceAddress> {
        let entries: Vec<HealthServiceEntry> = self
            .client
            .get(format!("{}/v1/health/service/{name}", self.base_url))
            .query(&[("passing", "true")])
            .send()
            .await
            .map_err(|e| PlatformError::RegistryUnavailable(e.to_string()))?
            .error_for_status()?
            .json()
            .await?;

        let service = entries
            .into_iter()
            .next()
            .map(|entry| entry.service)
            .ok_or_else(|| PlatformError::NoHealthyInstance(name.to_string()))?;

        let address = if service.address.is_empty() {
            "localhost".to_string()
        } else {
            service.address
        };

        Ok(ServiceAddress::new(address, service.port))
    }
}
