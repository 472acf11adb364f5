//! Aggregated health of every routed service.

use std::collections::BTreeMap;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use crate::routing::RoutingTable;

/// Name the gateway reports in its own health body.
pub const GATEWAY_NAME: &str = "api-gateway";

/// Result of probing one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Healthy,
    Unhealthy,
}

/// Overall gateway status: `degraded` as soon as one service is unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Healthy,
    Degraded,
}

/// Body of the gateway's `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayHealth {
    pub status: GatewayStatus,
    pub service: String,
    pub services: BTreeMap<String, ServiceHealth>,
}

/// Probes `GET {url}/health` on every routed service concurrently.
#[derive(Clone)]
pub struct HealthAggregator {
    client: reqwest::Client,
    table: RoutingTable,
}

impl HealthAggregator {
    /// Every probe is bounded by `probe_timeout`.
    pub fn new(table: RoutingTable, probe_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(probe_timeout).build()?;
        Ok(Self { client, table })
    }

    pub async fn check(&self) -> GatewayHealth {
        let routes = self.table.snapshot().await;
        let probes = routes.into_iter().map(|(name, url)| async move {
            let health = self.probe(&name, &url).await;
            (name, health)
        });
        let services: BTreeMap<_, _> = join_all(probes).await.into_iter().collect();

        let status = if services.values().all(|h| *h == ServiceHealth::Healthy) {
            GatewayStatus::Healthy
        } else {
            GatewayStatus::Degraded
        };

        GatewayHealth {
            status,
            service: GATEWAY_NAME.to_string(),
            services,
        }
    }

    async fn probe(&self, name: &str, base_url: &str) -> ServiceHealth {
        let url = format!("{}/health", base_url.trim_end_matches('/'));
        match self.client.get(&url).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => ServiceHealth::Healthy,
            Ok(response) => {
                tracing::warn!(service = name, status = %response.status(), "health probe failed");
                ServiceHealth::Unhealthy
            }
            Err(e) => {
                tracing::warn!(service = name, error = %e, "health probe failed");
                ServiceHealth::Unhealthy
            }
        }
    }
}
