//! Gateway error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors raised while forwarding a request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No base URL is known for the service.
    #[error("{0} unavailable")]
    NoRoute(String),

    /// The upstream could not be reached or did not answer in time.
    #[error("service unavailable")]
    Upstream {
        service: String,
        #[source]
        source: reqwest::Error,
    },

    /// The inbound request body could not be read.
    #[error("invalid request body: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NoRoute(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let GatewayError::Upstream { service, source } = &self {
            tracing::error!(%service, error = %source, "proxy error");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_route_is_service_unavailable() {
        let err = GatewayError::NoRoute("order-service".into());
        assert_eq!(err.to_string(), "order-service unavailable");
        assert_eq!(
            err.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn invalid_request_is_bad_request() {
        let err = GatewayError::InvalidRequest("length limit exceeded".into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
