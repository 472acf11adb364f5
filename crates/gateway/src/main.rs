//! API gateway entry point.

use gateway::config::Config;
use gateway::discovery::{self, Discovery};
use gateway::routing::RoutingTable;
use gateway::{SERVICE_NAME, create_app, create_state};
use platform::ConsulRegistry;
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

    // 3. Seed the routing table and start discovery
    let table = RoutingTable::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let discovery_task = match ConsulRegistry::connect(config.consul_url.clone()).await {
        Ok(registry) => {
            let discovery = Discovery::new(registry, table.clone(), config.routes.clone());
            discovery.refresh_once().await;
            let interval = config.refresh_interval;
            let shutdown = stopped(shutdown_rx.clone());
            Some(tokio::spawn(async move {
                discovery.run(interval, shutdown).await;
            }))
        }
        Err(e) => {
            tracing::warn!(error = %e, "registry unavailable, using static fallbacks only");
            discovery::install_fallbacks(&table, &config.routes).await;
            None
        }
    };

    // 4. Build the application and serve
    let state = create_state(table, config.proxy_timeout, config.health_probe_timeout)
        .expect("failed to build HTTP clients");
    let app = create_app(state, &config.routes, metrics_handle);

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let addr = config.addr();
    tracing::info!(%addr, service = SERVICE_NAME, "starting gateway");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(stopped(shutdown_rx))
        .await
        .expect("server error");

    // 5. Stop discovery
    if let Some(task) = discovery_task
        && let Err(e) = task.await
    {
        tracing::error!(error = %e, "discovery task failed");
    }

    tracing::info!("server shut down gracefully");
}
