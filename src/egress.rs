//! Proxy-aware outbound fetches.
//!
//! A single pooled `reqwest::Client` routes every outbound check through the
//! configured egress proxy. Each check performs exactly one GET (no retries),
//! buffers the body, reshapes it into JSON and stamps it with the server time.
//! Upstream status codes are passed through untouched: a 4xx/5xx body is still
//! returned as a successful check, with a warning logged.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::clock::now_rfc3339;
use crate::config::{
    EgressTargets, ProxyConfig, EGRESS_CONNECT_TIMEOUT, EGRESS_EXPECT_CONTINUE_TIMEOUT,
    EGRESS_IDLE_TIMEOUT, EGRESS_MAX_IDLE_CONNECTIONS, EGRESS_REQUEST_TIMEOUT,
    EGRESS_TCP_KEEPALIVE, EGRESS_TLS_HANDSHAKE_TIMEOUT, EGRESS_USER_AGENT,
};

/// Key injected into every annotated response
pub const CURRENT_TIME_KEY: &str = "currentTime";

/// How an upstream body is turned into the response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Whole body is an opaque IP string, wrapped as `{ip, currentTime}`
    RawIp,
    /// Body is a JSON object, passed through with `currentTime` added
    JsonObject,
}

/// One outbound check: where to go and how to present the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressCheck {
    pub name: &'static str,
    pub url: String,
    pub shape: ResponseShape,
    /// Prefix of the error message when the upstream cannot be reached
    pub failure_context: &'static str,
}

impl EgressCheck {
    pub fn external_ip(url: impl Into<String>) -> Self {
        Self {
            name: "external-ip",
            url: url.into(),
            shape: ResponseShape::RawIp,
            failure_context: "Error getting external IP",
        }
    }

    pub fn ipinfo(url: impl Into<String>) -> Self {
        Self {
            name: "ipinfo",
            url: url.into(),
            shape: ResponseShape::JsonObject,
            failure_context: "Error connecting to ipinfo.io",
        }
    }

    pub fn httpbin(url: impl Into<String>) -> Self {
        Self {
            name: "httpbin",
            url: url.into(),
            shape: ResponseShape::JsonObject,
            failure_context: "Error connecting to httpbin.org",
        }
    }
}

/// The three checks exposed over HTTP.
#[derive(Debug, Clone)]
pub struct EgressChecks {
    pub external_ip: EgressCheck,
    pub ipinfo: EgressCheck,
    pub httpbin: EgressCheck,
}

impl EgressChecks {
    pub fn from_targets(targets: &EgressTargets) -> Self {
        Self {
            external_ip: EgressCheck::external_ip(&targets.external_ip),
            ipinfo: EgressCheck::ipinfo(&targets.ipinfo),
            httpbin: EgressCheck::httpbin(&targets.httpbin),
        }
    }
}

/// Payload of the external IP check
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIpResponse {
    pub ip: String,
    pub current_time: String,
}

/// Error type for a single outbound check. Rendered as a plain-text 500.
#[derive(Debug, thiserror::Error)]
pub enum EgressError {
    #[error("{context}: {source}")]
    Connect {
        context: &'static str,
        source: reqwest::Error,
    },

    #[error("Error reading response: {0}")]
    Read(#[source] reqwest::Error),

    #[error("Error parsing response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{context}: egress client unavailable: {message}")]
    Setup {
        context: &'static str,
        message: String,
    },
}

impl EgressError {
    /// Message including the full cause chain, e.g. the underlying
    /// "connection refused" that reqwest's own message leaves out.
    pub fn describe(&self) -> String {
        let mut message = self.to_string();
        let mut cause = std::error::Error::source(self).and_then(|err| err.source());
        while let Some(err) = cause {
            message.push_str(": ");
            message.push_str(&err.to_string());
            cause = err.source();
        }
        message
    }
}

impl IntoResponse for EgressError {
    fn into_response(self) -> Response {
        let message = self.describe();
        error!(error = %message, "Egress check failed");
        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}

/// Shared outbound client. Cheap to clone.
#[derive(Clone)]
pub struct EgressClient {
    inner: Arc<Result<reqwest::Client, String>>,
}

impl EgressClient {
    /// Build the pooled client for the given proxy settings.
    ///
    /// An unusable proxy URL does not abort startup; the error is kept and
    /// reported by every check instead.
    pub fn new(proxy: &ProxyConfig) -> Self {
        let client = build_client(proxy.egress_proxy.as_deref()).map_err(|e| {
            error!(
                proxy = ?proxy.egress_proxy,
                error = %e,
                "Failed to build egress client, egress checks will fail"
            );
            e.to_string()
        });

        if client.is_ok() {
            debug!(
                proxy = ?proxy.egress_proxy,
                timeout = ?EGRESS_REQUEST_TIMEOUT,
                connect_timeout = ?EGRESS_CONNECT_TIMEOUT,
                tls_handshake_timeout = ?EGRESS_TLS_HANDSHAKE_TIMEOUT,
                expect_continue_timeout = ?EGRESS_EXPECT_CONTINUE_TIMEOUT,
                "Built egress client"
            );
        }

        Self {
            inner: Arc::new(client),
        }
    }

    /// Whether the client was built successfully.
    pub fn is_ready(&self) -> bool {
        self.inner.is_ok()
    }

    /// Perform one GET for `check` and return the annotated JSON payload.
    pub async fn fetch_and_annotate(&self, check: &EgressCheck) -> Result<Value, EgressError> {
        let client = match &*self.inner {
            Ok(client) => client,
            Err(message) => {
                return Err(EgressError::Setup {
                    context: check.failure_context,
                    message: message.clone(),
                })
            }
        };

        let response = client
            .get(&check.url)
            .send()
            .await
            .map_err(|source| EgressError::Connect {
                context: check.failure_context,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                check = check.name,
                status = status.as_u16(),
                "Upstream returned non-success status, passing body through"
            );
        }

        let body = response.bytes().await.map_err(EgressError::Read)?;
        debug!(check = check.name, bytes = body.len(), "Upstream response received");

        annotate(check.shape, &body, now_rfc3339())
    }
}

fn build_client(proxy: Option<&str>) -> Result<reqwest::Client, reqwest::Error> {
    let builder = reqwest::Client::builder()
        .user_agent(EGRESS_USER_AGENT)
        .timeout(EGRESS_REQUEST_TIMEOUT)
        .connect_timeout(EGRESS_CONNECT_TIMEOUT)
        .tcp_keepalive(EGRESS_TCP_KEEPALIVE)
        .pool_max_idle_per_host(EGRESS_MAX_IDLE_CONNECTIONS)
        .pool_idle_timeout(EGRESS_IDLE_TIMEOUT);

    // Without an explicit proxy, go direct rather than picking up ambient
    // system proxy settings.
    let builder = match proxy {
        Some(url) => builder.proxy(reqwest::Proxy::all(url)?),
        None => builder.no_proxy(),
    };

    builder.build()
}

/// Reshape an upstream body and add the timestamp.
fn annotate(shape: ResponseShape, body: &[u8], current_time: String) -> Result<Value, EgressError> {
    match shape {
        ResponseShape::RawIp => {
            let response = ExternalIpResponse {
                ip: String::from_utf8_lossy(body).into_owned(),
                current_time,
            };
            Ok(serde_json::to_value(response)?)
        }
        ResponseShape::JsonObject => {
            let mut object: Map<String, Value> = serde_json::from_slice(body)?;
            object.insert(CURRENT_TIME_KEY.to_string(), Value::String(current_time));
            Ok(Value::Object(object))
        }
    }
}
