//! API gateway.
//!
//! Routes each configured path prefix to the base URL the service registry
//! last reported for its service, falling back to a static URL when the
//! registry has never produced one.
//!
//! ```text
//!            ┌──────────────┐  refresh every N s  ┌──────────┐
//!            │ RoutingTable │ ◄────────────────── │ Discovery│ ◄── registry
//!            └──────┬───────┘                     └──────────┘
//!   request ──► Proxy ──► upstream service
//!   /health ──► HealthAggregator ──► GET {url}/health per service
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod health;
pub mod proxy;
pub mod routes;
pub mod routing;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Request, State};
use axum::routing::{any, get};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Route;
use health::HealthAggregator;
use proxy::Proxy;
use routes::gateway::AppState;
use routing::RoutingTable;

/// Name under which the gateway identifies itself.
pub const SERVICE_NAME: &str = health::GATEWAY_NAME;

/// Creates the Axum application router: the gateway's own endpoints plus
/// one catch-all pair per configured route.
pub fn create_app(
    state: Arc<AppState>,
    proxied: &[Route],
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let mut router: Router<Arc<AppState>> = Router::new()
        .route("/health", get(routes::gateway::health))
        .route("/services", get(routes::gateway::services));

    for route in proxied {
        let service = route.service.clone();
        let handler = move |State(state): State<Arc<AppState>>, request: Request| {
            let service = service.clone();
            async move { routes::proxy::forward(state, service, request).await }
        };
        router = router
            .route(&route.prefix, any(handler.clone()))
            .route(&format!("{}/{{*rest}}", route.prefix), any(handler));
    }

    router
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state around a routing table.
pub fn create_state(
    table: RoutingTable,
    proxy_timeout: Duration,
    health_probe_timeout: Duration,
) -> Result<Arc<AppState>, reqwest::Error> {
    Ok(Arc::new(AppState {
        proxy: Proxy::new(table.clone(), proxy_timeout)?,
        health: HealthAggregator::new(table.clone(), health_probe_timeout)?,
        table,
    }))
}
