//! Routing table of logical service name to base URL.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

/// Shared, reader/writer-synchronized service map.
///
/// Every proxied request reads it; only the discovery refresh writes it.
/// A URL is fully resolved before [`RoutingTable::install`] takes the write
/// lock, so readers never see a half-updated entry.
#[derive(Clone, Default)]
pub struct RoutingTable {
    routes: Arc<RwLock<HashMap<String, String>>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the base URL currently installed for `service`.
    pub async fn get(&self, service: &str) -> Option<String> {
        self.routes.read().await.get(service).cloned()
    }

    /// Installs `url` for `service`, returning the URL it replaced.
    pub async fn install(&self, service: &str, url: impl Into<String>) -> Option<String> {
        let url = url.into();
        let previous = self
            .routes
            .write()
            .await
            .insert(service.to_string(), url.clone());
        if previous.as_deref() != Some(url.as_str()) {
            tracing::info!(service, %url, "updated route");
        }
        previous
    }

    /// Copy of the whole table, ordered by service name.
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.routes
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Names of every service with an installed route.
    pub async fn services(&self) -> Vec<String> {
        let mut names: Vec<_> = self.routes.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}
