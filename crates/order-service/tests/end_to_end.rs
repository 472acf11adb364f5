//! Order placement through inventory reconciliation, across both services.
//!
//! The product service is served on a loopback port and reached over HTTP;
//! both services share one in-memory message bus.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{ALL_PRODUCTS_CACHE_KEY, ORDER_CREATED_QUEUE, ProductId};
use futures_util::StreamExt;
use metrics_exporter_prometheus::PrometheusHandle;
use order_service::client::HttpProductClient;
use order_service::store::InMemoryOrderStore;
use platform::{InMemoryCache, InMemoryMessageBus, MessageBus};
use product_service::consumer::{InventoryConsumer, MessageOutcome};
use product_service::store::{InMemoryProductStore, ProductStore};
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

struct ProductServiceHandle {
    base_url: String,
    store: InMemoryProductStore,
    cache: InMemoryCache,
}

async fn spawn_product_service() -> ProductServiceHandle {
    let store = InMemoryProductStore::new();
    let cache = InMemoryCache::new();
    let state = product_service::create_state(
        Arc::new(store.clone()),
        Arc::new(cache.clone()),
        Duration::from_secs(300),
    );
    let app = product_service::create_app(state, get_metrics_handle());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    ProductServiceHandle {
        base_url: format!("http://{addr}"),
        store,
        cache,
    }
}

async fn create_product(base_url: &str, name: &str, price: f64, quantity: i32) -> i64 {
    let response = reqwest::Client::new()
        .post(format!("{base_url}/products"))
        .json(&serde_json::json!({"name": name, "price": price, "quantity": quantity}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let body: serde_json::Value = response.json().await.unwrap();
    body["id"].as_i64().unwrap()
}

async fn fetch_product(base_url: &str, id: i64) {
    let response = reqwest::get(format!("{base_url}/products/{id}"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn order_reduces_inventory_and_invalidates_cache() {
    let products = spawn_product_service().await;
    let p1 = create_product(&products.base_url, "P1", 10.00, 10).await;
    let p2 = create_product(&products.base_url, "P2", 5.00, 10).await;

    // Warm the cache so invalidation is observable.
    fetch_product(&products.base_url, p1).await;
    fetch_product(&products.base_url, p2).await;
    reqwest::get(format!("{}/products", products.base_url))
        .await
        .unwrap();
    assert!(products.cache.contains(ALL_PRODUCTS_CACHE_KEY).await);

    let bus = InMemoryMessageBus::new();
    let catalog = HttpProductClient::new(&products.base_url, Duration::from_secs(5)).unwrap();
    let state = order_service::create_state(
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(catalog),
        Arc::new(bus.clone()),
    )
    .await
    .unwrap();
    let orders = order_service::create_app(state, get_metrics_handle());

    let request = Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "customer_name": "Ada",
                "items": [
                    {"product_id": p1, "quantity": 2},
                    {"product_id": p2, "quantity": 1}
                ]
            })
            .to_string(),
        ))
        .unwrap();
    let response = orders.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let order: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(order["total_amount"], 25.0);
    assert_eq!(order["status"], "pending");

    let consumer = InventoryConsumer::new(products.store.clone(), products.cache.clone());
    let mut deliveries = bus.consume(ORDER_CREATED_QUEUE).await.unwrap();
    let delivery = deliveries.next().await.unwrap().unwrap();
    assert_eq!(consumer.process(delivery).await, MessageOutcome::Acked);

    let p1_after = products.store.get(ProductId::new(p1)).await.unwrap().unwrap();
    let p2_after = products.store.get(ProductId::new(p2)).await.unwrap().unwrap();
    assert_eq!(p1_after.quantity, 8);
    assert_eq!(p2_after.quantity, 9);

    assert!(!products.cache.contains(ALL_PRODUCTS_CACHE_KEY).await);
    assert!(!products.cache.contains(&ProductId::new(p1).cache_key()).await);
    assert!(!products.cache.contains(&ProductId::new(p2).cache_key()).await);
    assert_eq!(bus.acked_count(ORDER_CREATED_QUEUE).await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_product_over_http_rejects_order() {
    let products = spawn_product_service().await;
    let p1 = create_product(&products.base_url, "P1", 10.00, 10).await;

    let bus = InMemoryMessageBus::new();
    let store = InMemoryOrderStore::new();
    let catalog = HttpProductClient::new(&products.base_url, Duration::from_secs(5)).unwrap();
    let state = order_service::create_state(
        Arc::new(store.clone()),
        Arc::new(catalog),
        Arc::new(bus.clone()),
    )
    .await
    .unwrap();
    let orders = order_service::create_app(state, get_metrics_handle());

    let request = Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "customer_name": "Ada",
                "items": [
                    {"product_id": p1, "quantity": 1},
                    {"product_id": 9999, "quantity": 1}
                ]
            })
            .to_string(),
        ))
        .unwrap();
    let response = orders.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.order_count().await, 0);
    assert_eq!(bus.published_count(ORDER_CREATED_QUEUE).await, 0);
    assert_eq!(
        products
            .store
            .get(ProductId::new(p1))
            .await
            .unwrap()
            .unwrap()
            .quantity,
        10
    );
}
