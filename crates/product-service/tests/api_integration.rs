//! Integration tests for the product HTTP API.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::ALL_PRODUCTS_CACHE_KEY;
use metrics_exporter_prometheus::PrometheusHandle;
use platform::InMemoryCache;
use product_service::store::InMemoryProductStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, InMemoryProductStore, InMemoryCache) {
    let store = InMemoryProductStore::new();
    let cache = InMemoryCache::new();
    let state = product_service::create_state(
        Arc::new(store.clone()),
        Arc::new(cache.clone()),
        Duration::from_secs(300),
    );
    let app = product_service::create_app(state, get_metrics_handle());
    (app, store, cache)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _) = setup();
    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "product-service");
}

#[tokio::test]
async fn test_create_and_get_product() {
    let (app, _, cache) = setup();

    let (status, created) = send(
        &app,
        post_json(
            "/products",
            serde_json::json!({"name": "Widget", "price": 10.0, "quantity": 5}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Widget");
    assert_eq!(created["price"], 10.0);
    let id = created["id"].as_i64().unwrap();

    let (status, fetched) = send(&app, get(&format!("/products/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["quantity"], 5);
    assert!(cache.contains(&format!("product:{id}")).await);
}

#[tokio::test]
async fn test_list_reflects_new_product_after_cached_list() {
    let (app, _, cache) = setup();
    send(
        &app,
        post_json("/products", serde_json::json!({"name": "A", "price": 1.0})),
    )
    .await;

    let (_, first) = send(&app, get("/products")).await;
    assert_eq!(first.as_array().unwrap().len(), 1);
    assert!(cache.contains(ALL_PRODUCTS_CACHE_KEY).await);

    send(
        &app,
        post_json("/products", serde_json::json!({"name": "B", "price": 2.0})),
    )
    .await;

    let (_, second) = send(&app, get("/products")).await;
    let names: Vec<_> = second
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[tokio::test]
async fn test_create_requires_name_and_price() {
    let (app, store, _) = setup();

    let (status, json) = send(
        &app,
        post_json("/products", serde_json::json!({"price": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "name is required");

    let (status, _) = send(
        &app,
        post_json("/products", serde_json::json!({"name": "NoPrice"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (app, _, _) = setup();
    let request = Request::builder()
        .method("POST")
        .uri("/products")
        .header("content-type", "application/json")
        .body(Body::from("{oops"))
        .unwrap();

    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_get_unknown_product_is_not_found() {
    let (app, _, _) = setup();
    let (status, json) = send(&app, get("/products/999")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Product not found");
}

#[tokio::test]
async fn test_non_numeric_id_is_json_bad_request() {
    let (app, _, _) = setup();

    let (status, json) = send(&app, get("/products/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid product ID");

    let (status, json) = send(&app, delete("/products/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid product ID");
}

#[tokio::test]
async fn test_delete_product() {
    let (app, _, cache) = setup();
    let (_, created) = send(
        &app,
        post_json("/products", serde_json::json!({"name": "Gone", "price": 3.5})),
    )
    .await;
    let id = created["id"].as_i64().unwrap();
    send(&app, get(&format!("/products/{id}"))).await;

    let (status, json) = send(&app, delete(&format!("/products/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Product deleted");
    assert!(!cache.contains(&format!("product:{id}")).await);

    let (status, _) = send(&app, delete(&format!("/products/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cache_outage_is_invisible_to_clients() {
    let (app, _, cache) = setup();
    cache.set_unavailable(true);

    let (status, _) = send(
        &app,
        post_json("/products", serde_json::json!({"name": "A", "price": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, list) = send(&app, get("/products")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_store_outage_is_internal_error() {
    let (app, store, _) = setup();
    store.set_unavailable(true).await;

    let (status, json) = send(&app, get("/products")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _, _) = setup();
    send(&app, get("/products")).await;

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}
