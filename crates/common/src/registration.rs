//! Service registry records.

use serde::{Deserialize, Serialize};

/// Health-check thresholds attached to a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    pub url: String,
    pub interval: String,
    pub timeout: String,
    pub deregister_after: String,
}

impl HealthCheckSpec {
    /// HTTP check with the standard 10s interval, 5s timeout and 30s expiry.
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            interval: "10s".to_string(),
            timeout: "5s".to_string(),
            deregister_after: "30s".to_string(),
        }
    }
}

/// One running instance of a logical service.
///
/// Rebuilt at every process start and removed again on graceful shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    pub name: String,
    pub id: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub check: HealthCheckSpec,
}

impl ServiceRegistration {
    /// Builds a registration whose health check points at `GET /health`.
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        tags: Vec<String>,
    ) -> Self {
        let address = address.into();
        let check = HealthCheckSpec::http(format!("http://{address}:{port}/health"));
        Self {
            name: name.into(),
            id: id.into(),
            address,
            port,
            tags,
            check,
        }
    }
}

/// Network location of a healthy instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAddress {
    pub address: String,
    pub port: u16,
}

impl ServiceAddress {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Base URL for HTTP calls to this instance.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_derives_health_url() {
        let reg = ServiceRegistration::new(
            "order-service",
            "order-service-1",
            "10.0.0.5",
            8082,
            vec!["api".into(), "orders".into()],
        );
        assert_eq!(reg.check.url, "http://10.0.0.5:8082/health");
        assert_eq!(reg.check.interval, "10s");
        assert_eq!(reg.check.deregister_after, "30s");
    }

    #[test]
    fn address_url() {
        assert_eq!(
            ServiceAddress::new("localhost", 8081).url(),
            "http://localhost:8081"
        );
    }
}
