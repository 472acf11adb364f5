//! Service registry client.

mod consul;
mod memory;

pub use consul::ConsulRegistry;
pub use memory::InMemoryRegistry;

use std::net::UdpSocket;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ServiceAddress, ServiceRegistration};

use crate::Result;

/// Directory of logical service names to live network locations.
///
/// Only instances passing their health check are eligible for lookup.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Registers an instance together with its HTTP health check.
    async fn register(&self, registration: &ServiceRegistration) -> Result<()>;

    /// Removes an instance by its instance id.
    async fn deregister(&self, service_id: &str) -> Result<()>;

    /// Returns one healthy instance of `name`.
    ///
    /// Fails with `NoHealthyInstance` when the registry has no passing
    /// instance, or with a transport error when the registry is unreachable.
    async fn lookup(&self, name: &str) -> Result<ServiceAddress>;
}

/// Convenience methods available on every registry.
#[async_trait]
pub trait ServiceRegistryExt: ServiceRegistry {
    /// Returns the base URL of one healthy instance of `name`.
    async fn service_url(&self, name: &str) -> Result<String> {
        Ok(self.lookup(name).await?.url())
    }
}

impl<T: ServiceRegistry + ?Sized> ServiceRegistryExt for T {}

#[async_trait]
impl<T: ServiceRegistry + ?Sized> ServiceRegistry for Arc<T> {
    async fn register(&self, registration: &ServiceRegistration) -> Result<()> {
        (**self).register(registration).await
    }

    async fn deregister(&self, service_id: &str) -> Result<()> {
        (**self).deregister(service_id).await
    }

    async fn lookup(&self, name: &str) -> Result<ServiceAddress> {
        (**self).lookup(name).await
    }
}

/// Preferred outbound IP of this host, used as the advertised address.
///
/// Connecting a UDP socket sends nothing; it only asks the kernel which
/// local address it would route from. Falls back to loopback.
pub fn outbound_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}
