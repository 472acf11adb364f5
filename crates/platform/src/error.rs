use thiserror::Error;

/// Errors raised by the registry, cache and message bus clients.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The registry agent could not be reached.
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// The registry answered but lists no passing instance.
    #[error("No healthy instances of {0} found")]
    NoHealthyInstance(String),

    /// The registry rejected a request.
    #[error("Registry request failed: {0}")]
    Registry(String),

    /// The cache backend failed or is unreachable.
    #[error("Cache error: {0}")]
    Cache(String),

    /// The message bus failed or is unreachable.
    #[error("Message bus error: {0}")]
    Bus(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for platform client operations.
pub type Result<T> = std::result::Result<T, PlatformError>;
