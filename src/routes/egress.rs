//! Outbound checks routed through the egress proxy.
//!
//! Each handler runs one check from `AppState::checks`; failures come back as
//! plain-text 500 responses via `EgressError`.

use axum::{extract::State, Json};
use serde_json::Value;
use tracing::instrument;

use crate::egress::{EgressCheck, EgressError};
use crate::state::AppState;

async fn run(state: &AppState, check: &EgressCheck) -> Result<Json<Value>, EgressError> {
    let payload = state.egress.fetch_and_annotate(check).await?;
    Ok(Json(payload))
}

/// External IP as seen by the upstream service.
#[instrument(name = "egress::external_ip", skip(state))]
pub async fn external_ip(State(state): State<AppState>) -> Result<Json<Value>, EgressError> {
    run(&state, &state.checks.external_ip).await
}

/// IP geolocation lookup.
#[instrument(name = "egress::test_ipinfo", skip(state))]
pub async fn test_ipinfo(State(state): State<AppState>) -> Result<Json<Value>, EgressError> {
    run(&state, &state.checks.ipinfo).await
}

/// HTTP echo service lookup.
#[instrument(name = "egress::test_httpbin", skip(state))]
pub async fn test_httpbin(State(state): State<AppState>) -> Result<Json<Value>, EgressError> {
    run(&state, &state.checks.httpbin).await
}
