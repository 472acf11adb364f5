//! Product catalog service.
//!
//! Serves product CRUD over HTTP through a cache-aside repository, and
//! reconciles inventory from `order.created` messages in a background
//! consumer.

pub mod config;
pub mod consumer;
pub mod error;
pub mod repository;
pub mod routes;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use platform::Cache;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use repository::CachedProductRepository;
use routes::products::AppState;
use store::ProductStore;

/// Name under which the service registers and reports health.
pub const SERVICE_NAME: &str = "product-service";

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/products",
            get(routes::products::list).post(routes::products::create),
        )
        .route(
            "/products/{id}",
            get(routes::products::get).delete(routes::products::delete),
        )
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

/// Creates the application state over a store and cache.
pub fn create_state(
    store: Arc<dyn ProductStore>,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
) -> Arc<AppState> {
    Arc::new(AppState {
        products: CachedProductRepository::new(store, cache, cache_ttl),
    })
}
