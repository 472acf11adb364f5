//! Order service entry point.

use std::sync::Arc;

use common::ServiceRegistration;
use order_service::client::{HttpProductClient, ProductCatalog};
use order_service::config::Config;
use order_service::store::{OrderStore, PostgresOrderStore};
use order_service::{SERVICE_NAME, create_app, create_state, resolve_product_service};
use platform::{ConsulRegistry, MessageBus, NatsMessageBus, ServiceRegistry};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Connect to the store and message bus
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to PostgreSQL");
    let store: Arc<dyn OrderStore> = Arc::new(PostgresOrderStore::new(pool));

    let bus: Arc<dyn MessageBus> = Arc::new(
        NatsMessageBus::connect(&config.nats_url, SERVICE_NAME)
            .await
            .expect("failed to connect to NATS"),
    );

    // 4. Register and resolve the product service
    let registration = ServiceRegistration::new(
        SERVICE_NAME,
        config.service_id.clone(),
        config
            .service_address
            .clone()
            .unwrap_or_else(platform::outbound_ip),
        config.port,
        vec!["api".to_string(), "orders".to_string()],
    );
    let registry = match ConsulRegistry::connect(config.consul_url.clone()).await {
        Ok(registry) => {
            if let Err(e) = registry.register(&registration).await {
                tracing::warn!(error = %e, "failed to register service");
            }
            Some(registry)
        }
        Err(e) => {
            tracing::warn!(error = %e, "registry unavailable, running unregistered");
            None
        }
    };

    let product_url =
        resolve_product_service(registry.as_ref(), &config.product_service_url).await;
    let catalog: Arc<dyn ProductCatalog> = Arc::new(
        HttpProductClient::new(product_url, config.product_lookup_timeout)
            .expect("failed to build product client"),
    );

    // 5. Build the application and serve
    let state = create_state(store, catalog, bus)
        .await
        .expect("failed to declare order.created queue");
    let app = create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting order service");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 6. Leave the registry
    if let Some(registry) = registry
        && let Err(e) = registry.deregister(&registration.id).await
    {
        tracing::warn!(error = %e, "failed to deregister service");
    }

    tracing::info!("server shut down gracefully");
}
