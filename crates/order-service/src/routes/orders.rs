//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CreateOrderRequest, Order, OrderId, UpdateStatusRequest};
use platform::MessageBus;
use serde::Serialize;

use crate::client::ProductCatalog;
use crate::error::ApiError;
use crate::saga::OrderSaga;
use crate::store::OrderStore;

/// The saga as wired into the HTTP layer.
pub type DynOrderSaga = OrderSaga<Arc<dyn OrderStore>, Arc<dyn ProductCatalog>, Arc<dyn MessageBus>>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub saga: DynOrderSaga,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// GET /orders: every order with its items, newest first.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.saga.list_orders().await?))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let id = parse_order_id(&id)?;
    Ok(Json(state.saga.get_order(id).await?))
}

/// POST /orders: prices and creates an order.
#[tracing::instrument(skip(state, payload))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(req) = payload?;
    let order = state.saga.create_order(req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// PATCH /orders/{id}/status
#[tracing::instrument(skip(state, payload))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_order_id(&id)?;
    let Json(req) = payload?;
    state.saga.update_status(id, &req.status).await?;
    Ok(Json(MessageResponse {
        message: "Order status updated".to_string(),
    }))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map(OrderId::new)
        .map_err(|_| ApiError::BadRequest("invalid order ID".to_string()))
}
