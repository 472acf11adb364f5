//! Health check endpoint.

use axum::Json;
use common::HealthResponse;

/// GET /health: liveness of the order service.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy(crate::SERVICE_NAME))
}
