use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{ServiceAddress, ServiceRegistration};
use tokio::sync::RwLock;

use super::ServiceRegistry;
use crate::{PlatformError, Result};

#[derive(Default)]
struct RegistryState {
    registrations: HashMap<String, ServiceRegistration>,
    instances: HashMap<String, ServiceAddress>,
}

/// In-memory registry for tests.
///
/// Lookups resolve either an explicitly pinned instance (see
/// [`InMemoryRegistry::set_instance`]) or the first registration carrying
/// the requested name.
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    state: Arc<RwLock<RegistryState>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the instance returned for `name`, replacing any previous one.
    pub async fn set_instance(&self, name: &str, address: ServiceAddress) {
        self.state
            .write()
            .await
            .instances
            .insert(name.to_string(), address);
    }

    /// Removes the pinned instance for `name`.
    pub async fn remove_instance(&self, name: &str) {
        self.state.write().await.instances.remove(name);
    }

    /// Makes every call fail as if the agent were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the registration stored under an instance id.
    pub async fn registered(&self, service_id: &str) -> Option<ServiceRegistration> {
        self.state
            .read()
            .await
            .registrations
            .get(service_id)
            .cloned()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PlatformError::RegistryUnavailable(
                "registry is unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceRegistry for InMemoryRegistry {
    async fn register(&self, registration: &ServiceRegistration) -> Result<()> {
        self.check_available()?;
        self.state
            .write()
            .await
            .registrations
            .insert(registration.id.clone(), registration.clone());
        Ok(())
    }

    async fn deregister(&self, service_id: &str) -> Result<()> {
        self.check_available()?;
        self.state.write().await.registrations.remove(service_id);
        Ok(())
    }

    async fn lookup(&self, name: &str) -> Result<ServiceAddress> {
        self.check_available()?;
        let state = self.state.read().await;

        if let Some(address) = state.instances.get(name) {
            return Ok(address.clone());
        }

        let mut candidates: Vec<_> = state
            .registrations
            .values()
            .filter(|reg| reg.name == name)
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        candidates
            .first()
            .map(|reg| ServiceAddress::new(reg.address.clone(), reg.port))
            .ok_or_else(|| PlatformError::NoHealthyInstance(name.to_string()))
    }
}
