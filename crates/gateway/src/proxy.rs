//! Request forwarding to upstream services.

use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, header};
use axum::response::Response;

use crate::error::GatewayError;
use crate::routing::RoutingTable;

/// Largest request body the gateway will buffer.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Forwards requests to whatever base URL the routing table holds for a service.
///
/// The path and query are passed through unchanged, and so are the upstream
/// status, headers and body.
#[derive(Clone)]
pub struct Proxy {
    client: reqwest::Client,
    table: RoutingTable,
}

impl Proxy {
    pub fn new(table: RoutingTable, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client, table })
    }

    #[tracing::instrument(skip(self, request), fields(method = %request.method(), path = %request.uri().path()))]
    pub async fn forward(&self, service: &str, request: Request) -> Result<Response, GatewayError> {
        metrics::counter!("gateway_proxy_requests_total", "service" => service.to_string())
            .increment(1);

        let result = self.send(service, request).await;
        if result.is_err() {
            metrics::counter!("gateway_proxy_errors_total", "service" => service.to_string())
                .increment(1);
        }
        result
    }

    async fn send(&self, service: &str, request: Request) -> Result<Response, GatewayError> {
        let base_url = self
            .table
            .get(service)
            .await
            .ok_or_else(|| GatewayError::NoRoute(service.to_string()))?;

        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", base_url.trim_end_matches('/'), path_and_query);
        tracing::debug!(%service, %url, "routing request");

        let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|source| GatewayError::Upstream {
                service: service.to_string(),
                source,
            })?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);
        let bytes = upstream
            .bytes()
            .await
            .map_err(|source| GatewayError::Upstream {
                service: service.to_string(),
                source,
            })?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
