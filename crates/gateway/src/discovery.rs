//! Periodic routing table refresh from the service registry.

use std::future::Future;
use std::time::Duration;

use platform::{ServiceRegistry, ServiceRegistryExt};

use crate::config::Route;
use crate::routing::RoutingTable;

/// Keeps a [`RoutingTable`] in step with the registry.
///
/// For each configured route a successful lookup installs the discovered
/// URL. A failed lookup keeps whatever URL is already installed, or installs
/// the route's static fallback if there is none yet.
pub struct Discovery<R> {
    registry: R,
    table: RoutingTable,
    routes: Vec<Route>,
}

impl<R: ServiceRegistry> Discovery<R> {
    pub fn new(registry: R, table: RoutingTable, routes: Vec<Route>) -> Self {
        Self {
            registry,
            table,
            routes,
        }
    }

    /// Resolves every route once.
    pub async fn refresh_once(&self) {
        for route in &self.routes {
            match self.registry.service_url(&route.service).await {
                Ok(url) => {
                    self.table.install(&route.service, url).await;
                }
                Err(e) => {
                    metrics::counter!(
                        "gateway_route_refresh_failures_total",
                        "service" => route.service.clone()
                    )
                    .increment(1);

                    if let Some(current) = self.table.get(&route.service).await {
                        tracing::warn!(
                            service = %route.service,
                            error = %e,
                            url = %current,
                            "service lookup failed, keeping previous route"
                        );
                    } else {
                        tracing::warn!(
                            service = %route.service,
                            error = %e,
                            fallback = %route.fallback,
                            "service not found, using fallback"
                        );
                        self.table.install(&route.service, &route.fallback).await;
                    }
                }
            }
        }
    }

    /// Refreshes every `interval` until `shutdown` resolves.
    ///
    /// The first refresh happens one interval after the call; run
    /// [`Discovery::refresh_once`] beforehand to seed the table.
    pub async fn run(&self, interval: Duration, shutdown: impl Future<Output = ()>) {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    tracing::info!("stopping service discovery");
                    break;
                }
                _ = ticker.tick() => self.refresh_once().await,
            }
        }
    }
}

/// Installs every route's static fallback. Used when no registry is reachable.
pub async fn install_fallbacks(table: &RoutingTable, routes: &[Route]) {
    for route in routes {
        table.install(&route.service, &route.fallback).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ServiceAddress;
    use platform::InMemoryRegistry;

    fn routes() -> Vec<Route> {
        vec![
            Route::new("product-service", "/products", "http://product-service:8081"),
            Route::new("order-service", "/orders", "http://order-service:8082"),
        ]
    }

    #[tokio::test]
    async fn installs_discovered_urls() {
        let registry = InMemoryRegistry::new();
        registry
            .set_instance("product-service", ServiceAddress::new("10.0.0.1", 8081))
            .await;
        let table = RoutingTable::new();
        let discovery = Discovery::new(registry, table.clone(), routes());

        discovery.refresh_once().await;

        assert_eq!(
            table.get("product-service").await.as_deref(),
            Some("http://10.0.0.1:8081")
        );
        // Never discovered, so the fallback is used.
        assert_eq!(
            table.get("order-service").await.as_deref(),
            Some("http://order-service:8082")
        );
    }

    #[tokio::test]
    async fn failed_lookup_keeps_previous_url() {
        let registry = InMemoryRegistry::new();
        registry
            .set_instance("product-service", ServiceAddress::new("10.0.0.1", 8081))
            .await;
        let table = RoutingTable::new();
        let discovery = Discovery::new(registry.clone(), table.clone(), routes());
        discovery.refresh_once().await;

        registry.remove_instance("product-service").await;
        discovery.refresh_once().await;
        assert_eq!(
            table.get("product-service").await.as_deref(),
            Some("http://10.0.0.1:8081")
        );

        registry.set_unavailable(true);
        discovery.refresh_once().await;
        assert_eq!(
            table.get("product-service").await.as_deref(),
            Some("http://10.0.0.1:8081")
        );
    }

    #[tokio::test]
    async fn url_changes_only_on_refresh() {
        let registry = InMemoryRegistry::new();
        registry
            .set_instance("product-service", ServiceAddress::new("a", 1))
            .await;
        let table = RoutingTable::new();
        let discovery = Discovery::new(registry.clone(), table.clone(), routes());
        discovery.refresh_once().await;

        registry
            .set_instance("product-service", ServiceAddress::new("b", 2))
            .await;
        assert_eq!(table.get("product-service").await.as_deref(), Some("http://a:1"));

        discovery.refresh_once().await;
        assert_eq!(table.get("product-service").await.as_deref(), Some("http://b:2"));
    }

    #[tokio::test(start_paused = true)]
    async fn run_refreshes_on_interval_until_shutdown() {
        let registry = InMemoryRegistry::new();
        let table = RoutingTable::new();
        let discovery = std::sync::Arc::new(Discovery::new(
            registry.clone(),
            table.clone(),
            routes(),
        ));

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn({
            let discovery = discovery.clone();
            async move {
                discovery
                    .run(Duration::from_secs(10), async {
                        let _ = rx.await;
                    })
                    .await;
            }
        });

        registry
            .set_instance("product-service", ServiceAddress::new("a", 1))
            .await;
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(table.get("product-service").await.as_deref(), Some("http://a:1"));

        tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn fallbacks_seed_every_route() {
        let table = RoutingTable::new();
        install_fallbacks(&table, &routes()).await;
        assert_eq!(table.services().await.len(), 2);
    }
}
