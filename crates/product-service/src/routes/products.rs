//! Product CRUD endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CreateProductRequest, Product, ProductId};
use platform::Cache;
use serde::Serialize;

use crate::error::ApiError;
use crate::repository::CachedProductRepository;
use crate::store::{NewProduct, ProductStore};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub products: CachedProductRepository<Arc<dyn ProductStore>, Arc<dyn Cache>>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// GET /products: every product ordered by id.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.products.get_all().await?))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let id = parse_product_id(&id)?;
    state
        .products
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))
}

/// POST /products: creates a product; `name` and `price` are required.
#[tracing::instrument(skip(state, payload))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let Json(req) = payload?;
    let product = state.products.create(NewProduct::try_from(req)?).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// DELETE /products/{id}
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_product_id(&id)?;
    state.products.delete(id).await?;
    Ok(Json(MessageResponse {
        message: "Product deleted".to_string(),
    }))
}

fn parse_product_id(id: &str) -> Result<ProductId, ApiError> {
    id.parse()
        .map(ProductId::new)
        .map_err(|_| ApiError::BadRequest("invalid product ID".to_string()))
}
