//! Clients for the external collaborators of the order fulfillment services.
//!
//! Each collaborator is a trait with a production adapter and an in-memory
//! implementation used by tests:
//! - [`ServiceRegistry`]: Consul agent over HTTP, or [`InMemoryRegistry`]
//! - [`Cache`]: Redis, or [`InMemoryCache`]
//! - [`MessageBus`]: NATS JetStream work queues, or [`InMemoryMessageBus`]

pub mod bus;
pub mod cache;
pub mod error;
pub mod registry;

pub use bus::{
    Acknowledger, Delivery, DeliveryStream, InMemoryMessageBus, MessageBus, NatsMessageBus,
};
pub use cache::{Cache, CacheExt, InMemoryCache, RedisCache};
pub use error::{PlatformError, Result};
pub use registry::{
    ConsulRegistry, InMemoryRegistry, ServiceRegistry, ServiceRegistryExt, outbound_ip,
};
