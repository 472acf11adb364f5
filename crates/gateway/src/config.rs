//! Application configuration loaded from environment variables.

use std::time::Duration;

/// One proxied path prefix and the logical service behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Logical service name looked up in the registry.
    pub service: String,
    /// Path prefix, e.g. `/products`. Matches the prefix itself and everything below it.
    pub prefix: String,
    /// Static base URL used until the registry has produced one.
    pub fallback: String,
}

impl Route {
    pub fn new(
        service: impl Into<String>,
        prefix: impl Into<String>,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            prefix: prefix.into(),
            fallback: fallback.into(),
        }
    }
}

/// Gateway configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8080`)
/// - `CONSUL_URL`: registry agent
/// - `REFRESH_INTERVAL_SECS`: routing table refresh period (default: `10`)
/// - `HEALTH_PROBE_TIMEOUT_MS`: per-service health probe timeout (default: `2000`)
/// - `PROXY_TIMEOUT_SECS`: upstream request timeout (default: `30`)
/// - `PRODUCT_SERVICE_FALLBACK` / `ORDER_SERVICE_FALLBACK`: static base URLs
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub consul_url: String,
    pub refresh_interval: Duration,
    pub health_probe_timeout: Duration,
    pub proxy_timeout: Duration,
    pub routes: Vec<Route>,
    pub log_level: String,
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let product_fallback = std::env::var("PRODUCT_SERVICE_FALLBACK")
            .unwrap_or_else(|_| "http://product-service:8081".to_string());
        let order_fallback = std::env::var("ORDER_SERVICE_FALLBACK")
            .unwrap_or_else(|_| "http://order-service:8082".to_string());

        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            consul_url: std::env::var("CONSUL_URL").unwrap_or(defaults.consul_url),
            refresh_interval: env_u64("REFRESH_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.refresh_interval),
            health_probe_timeout: env_u64("HEALTH_PROBE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.health_probe_timeout),
            proxy_timeout: env_u64("PROXY_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.proxy_timeout),
            routes: default_routes(product_fallback, order_fallback),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_routes(product_fallback: String, order_fallback: String) -> Vec<Route> {
    vec![
        Route::new("product-service", "/products", product_fallback),
        Route::new("order-service", "/orders", order_fallback),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            consul_url: "http://localhost:8500".to_string(),
            refresh_interval: Duration::from_secs(10),
            health_probe_timeout: Duration::from_millis(2000),
            proxy_timeout: Duration::from_secs(30),
            routes: default_routes(
                "http://product-service:8081".to_string(),
                "http://order-service:8082".to_string(),
            ),
            log_level: "info".to_string(),
        }
    }
}
