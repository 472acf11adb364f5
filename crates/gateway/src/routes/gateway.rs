//! Gateway's own endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::health::{GatewayHealth, HealthAggregator};
use crate::proxy::Proxy;
use crate::routing::RoutingTable;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub table: RoutingTable,
    pub proxy: Proxy,
    pub health: HealthAggregator,
}

#[derive(Serialize)]
pub struct ServicesResponse {
    pub services: BTreeMap<String, String>,
}

/// GET /health: probes every routed service. Always 200; the body carries the verdict.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<GatewayHealth> {
    Json(state.health.check().await)
}

/// GET /services: the current routing table.
pub async fn services(State(state): State<Arc<AppState>>) -> Json<ServicesResponse> {
    Json(ServicesResponse {
        services: state.table.snapshot().await,
    })
}
