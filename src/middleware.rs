//! Request ID middleware for correlating logs with requests.
//!
//! Reuses a caller-supplied `x-request-id` when it is a valid UUID (so ids
//! assigned by an ingress or mesh sidecar carry through), otherwise generates
//! a UUID v4. The id wraps the request in a tracing span and is echoed back in
//! the response headers.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use http::header::{HeaderName, HeaderValue};
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the request id in both directions
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Middleware that assigns a request ID and creates a request span.
///
/// This should be the outermost layer so the span covers all processing.
pub async fn request_id_layer(request: Request, next: Next) -> Response {
    let request_id = incoming_request_id(&request).unwrap_or_else(Uuid::new_v4);
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
        duration_ms = tracing::field::Empty,
    );

    let start = Instant::now();

    async move {
        let mut response = next.run(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        tracing::Span::current().record("duration_ms", duration_ms);
        tracing::info!(
            status = response.status().as_u16(),
            duration_ms,
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
        response
    }
    .instrument(span)
    .await
}

fn incoming_request_id(request: &Request) -> Option<Uuid> {
    let raw = request.headers().get(&X_REQUEST_ID)?.to_str().ok()?;
    Uuid::parse_str(raw.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(header: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri("/api/system");
        if let Some(value) = header {
            builder = builder.header("x-request-id", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_incoming_uuid_is_reused() {
        let id = Uuid::new_v4();
        let request = request_with(Some(&id.to_string()));
        assert_eq!(incoming_request_id(&request), Some(id));
    }

    #[test]
    fn test_invalid_incoming_id_is_ignored() {
        assert_eq!(incoming_request_id(&request_with(Some("abc-123"))), None);
        assert_eq!(incoming_request_id(&request_with(None)), None);
    }
}
