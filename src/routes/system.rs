//! Pod and node identity endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::instrument;

use crate::clock::now_rfc3339;
use crate::state::AppState;

/// Identity snapshot assembled fresh for each request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub pod_name: String,
    pub node_name: String,
    pub namespace: String,
    #[serde(rename = "hostIP")]
    pub host_ip: String,
    #[serde(rename = "podIP")]
    pub pod_ip: String,
    pub current_time: String,
}

/// System info handler.
#[instrument(name = "system::system_info", skip(state))]
pub async fn system_info(State(state): State<AppState>) -> Json<SystemInfo> {
    let host_ip = state.identity.resolve_host_ip().await;
    let pod_ip = state.identity.resolve_pod_ip().await;
    let pod = &state.config.pod;

    Json(SystemInfo {
        pod_name: pod.pod_name.clone(),
        node_name: pod.node_name.clone(),
        namespace: pod.namespace.clone(),
        host_ip,
        pod_ip,
        current_time: now_rfc3339(),
    })
}
