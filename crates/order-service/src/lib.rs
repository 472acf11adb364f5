//! Order service.
//!
//! Creates orders by pricing each line against the product service,
//! persisting order and items in one transaction, and announcing the order
//! on the `order.created` queue.

pub mod client;
pub mod config;
pub mod error;
pub mod publisher;
pub mod routes;
pub mod saga;
pub mod store;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch};
use metrics_exporter_prometheus::PrometheusHandle;
use platform::{MessageBus, PlatformError, ServiceRegistry, ServiceRegistryExt};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use client::ProductCatalog;
use routes::orders::AppState;
use saga::OrderSaga;
use store::OrderStore;

/// Name under which the service registers and reports health.
pub const SERVICE_NAME: &str = "order-service";

/// Logical name of the product service in the registry.
pub const PRODUCT_SERVICE_NAME: &str = "product-service";

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            get(routes::orders::list).post(routes::orders::create),
        )
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/status", patch(routes::orders::update_status))
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

/// Creates the application state, declaring the `order.created` queue.
pub async fn create_state(
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn ProductCatalog>,
    bus: Arc<dyn MessageBus>,
) -> Result<Arc<AppState>, PlatformError> {
    let saga = OrderSaga::new(store, catalog, bus).await?;
    Ok(Arc::new(AppState { saga }))
}

/// Resolves the product service through the registry, or `fallback` when
/// the registry has no healthy instance or cannot be reached.
pub async fn resolve_product_service<R: ServiceRegistry + ?Sized>(
    registry: Option<&R>,
    fallback: &str,
) -> String {
    let Some(registry) = registry else {
        tracing::warn!(url = fallback, "no registry, using fallback product service URL");
        return fallback.to_string();
    };
    match registry.service_url(PRODUCT_SERVICE_NAME).await {
        Ok(url) => {
            tracing::info!(%url, "discovered product-service");
            url
        }
        Err(e) => {
            tracing::warn!(error = %e, url = fallback, "product-service not found, using fallback");
            fallback.to_string()
        }
    }
}
