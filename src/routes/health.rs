//! Health check endpoint for container orchestration.
//!
//! Liveness only: it never touches the network, so a broken egress path does
//! not get the pod restarted.

/// Health check handler.
pub async fn health() -> &'static str {
    "ok"
}
