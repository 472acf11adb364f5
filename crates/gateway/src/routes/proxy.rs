//! Catch-all proxy handler.

use std::sync::Arc;

use axum::extract::Request;
use axum::response::Response;

use super::gateway::AppState;
use crate::error::GatewayError;

/// ANY {prefix} and {prefix}/{*rest}: relays the request to `service`.
pub async fn forward(
    state: Arc<AppState>,
    service: String,
    request: Request,
) -> Result<Response, GatewayError> {
    tracing::info!(
        method = %request.method(),
        path = %request.uri().path(),
        %service,
        "routing request"
    );
    state.proxy.forward(&service, request).await
}
