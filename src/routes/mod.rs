//! HTTP route handlers.
//!
//! API routes are marked `Cache-Control: no-store` since every response
//! reflects live network state. Unknown paths fall through to axum's default
//! 404.
//!
//! Request tracing is enabled via middleware that assigns a request ID to each
//! incoming request, allowing correlation of all logs within a request.

pub mod egress;
pub mod health;
pub mod index;
pub mod system;

use axum::{middleware, routing::get, Router};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::CACHE_CONTROL_NO_STORE;
use crate::middleware::request_id_layer;
use crate::state::AppState;

/// Creates the Axum router with all routes and cache headers.
pub fn create_router(state: AppState) -> Router {
    // API - never cached, answers depend on the pod and the proxy path
    let api_routes = Router::new()
        .route("/api/system", get(system::system_info))
        .route("/api/external-ip", get(egress::external_ip))
        .route("/api/test-ipinfo", get(egress::test_ipinfo))
        .route("/api/test-httpbin", get(egress::test_httpbin))
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_NO_STORE),
        ));

    let page_routes = Router::new().route("/", get(index::index));

    // Health check - always fresh for liveness probes
    let health_routes = Router::new().route("/health", get(health::health));

    Router::new()
        .merge(api_routes)
        .merge(page_routes)
        .merge(health_routes)
        .with_state(state)
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}
