//! Product service entry point.

use std::sync::Arc;

use common::{ORDER_CREATED_QUEUE, ServiceRegistration};
use platform::{ConsulRegistry, MessageBus, NatsMessageBus, RedisCache, ServiceRegistry};
use product_service::config::Config;
use product_service::consumer::{ConsumerExit, InventoryConsumer};
use product_service::store::{PostgresProductStore, ProductStore};
use product_service::{SERVICE_NAME, create_app, create_state};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
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

/// Resolves once the shutdown flag flips to true.
async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
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

    // 3. Connect to the store, cache and message bus
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to PostgreSQL");
    let store: Arc<dyn ProductStore> = Arc::new(PostgresProductStore::new(pool));

    let cache = Arc::new(
        RedisCache::connect(&config.redis_url)
            .await
            .expect("failed to connect to Redis"),
    );

    let bus = NatsMessageBus::connect(&config.nats_url, SERVICE_NAME)
        .await
        .expect("failed to connect to NATS");
    bus.declare_queue(ORDER_CREATED_QUEUE)
        .await
        .expect("failed to declare queue");
    let deliveries = bus
        .consume(ORDER_CREATED_QUEUE)
        .await
        .expect("failed to start consuming");

    // 4. Start the inventory consumer
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let consumer = InventoryConsumer::new(store.clone(), cache.clone());
    let consumer_shutdown = stopped(shutdown_rx.clone());
    let consumer_stop = shutdown_tx.clone();
    let consumer_task = tokio::spawn(async move {
        // A closed delivery stream stops the whole service.
        if consumer.run(deliveries, consumer_shutdown).await == ConsumerExit::StreamClosed {
            tracing::error!("inventory consumer exited, shutting down");
            consumer_stop.send_replace(true);
        }
    });
    tracing::info!(queue = ORDER_CREATED_QUEUE, "listening for order events");

    // 5. Register with the service registry
    let registration = ServiceRegistration::new(
        SERVICE_NAME,
        config.service_id.clone(),
        config
            .service_address
            .clone()
            .unwrap_or_else(platform::outbound_ip),
        config.port,
        vec!["api".to_string(), "products".to_string()],
    );
    let registry = match ConsulRegistry::connect(config.consul_url.clone()).await {
        Ok(registry) => match registry.register(&registration).await {
            Ok(()) => Some(registry),
            Err(e) => {
                tracing::warn!(error = %e, "failed to register service");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "registry unavailable, running unregistered");
            None
        }
    };

    // 6. Build the application and serve
    let state = create_state(store, cache, config.cache_ttl);
    let app = create_app(state, metrics_handle);

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_tx.send_replace(true);
    });

    let addr = config.addr();
    tracing::info!(%addr, "starting product service");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(stopped(shutdown_rx))
        .await
        .expect("server error");

    // 7. Drain the consumer and leave the registry
    if let Err(e) = consumer_task.await {
        tracing::error!(error = %e, "inventory consumer task failed");
    }
    if let Some(registry) = registry
        && let Err(e) = registry.deregister(&registration.id).await
    {
        tracing::warn!(error = %e, "failed to deregister service");
    }

    tracing::info!("server shut down gracefully");
}
