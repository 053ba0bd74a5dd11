//! Landing page with the pod identity filled in.

use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
};
use tracing::instrument;

use crate::config::{AppConfig, INDEX_FALLBACK_BODY, INDEX_FILE};
use crate::state::AppState;

/// Index page handler.
///
/// A missing page is not an error: it answers 200 with a fixed message so
/// probes hitting `/` keep succeeding in images built without the asset.
#[instrument(name = "index::index", skip(state))]
pub async fn index(State(state): State<AppState>) -> Response {
    let path = state.config.static_dir.join(INDEX_FILE);

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let template = String::from_utf8_lossy(&bytes);
            Html(render_index(&template, &state.config)).into_response()
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Index page unavailable, serving fallback");
            INDEX_FALLBACK_BODY.into_response()
        }
    }
}

/// Substitute the identity placeholders in the page template.
pub fn render_index(template: &str, config: &AppConfig) -> String {
    [
        ("POD_NAME_PLACEHOLDER", config.pod.pod_name.as_str()),
        ("NODE_NAME_PLACEHOLDER", config.pod.node_name.as_str()),
        ("NAMESPACE_PLACEHOLDER", config.pod.namespace.as_str()),
        ("PROXY_URL_PLACEHOLDER", config.proxy.display_url.as_str()),
    ]
    .into_iter()
    .fold(template.to_string(), |page, (placeholder, value)| {
        page.replace(placeholder, value)
    })
}
