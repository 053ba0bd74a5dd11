//! Configuration loading and constants.
//!
//! All application settings come from environment variables read once at
//! startup. Unset or empty variables fall back to fixed defaults. `AppConfig`
//! is the root configuration struct and is immutable after construction.

use std::path::PathBuf;
use std::time::Duration;

use const_format::formatcp;

// =============================================================================
// HTTP Response Cache Control
// =============================================================================

/// API responses reflect live network state and must never be cached
pub const CACHE_CONTROL_NO_STORE: &str = "no-store";

// =============================================================================
// Egress Client Constants
// =============================================================================

/// Overall budget for one outbound request, connect through body
pub const EGRESS_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// TCP connect timeout (proxy or upstream)
pub const EGRESS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP keep-alive interval on pooled connections
pub const EGRESS_TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// Maximum idle pooled connections per host
pub const EGRESS_MAX_IDLE_CONNECTIONS: usize = 100;

/// Idle pooled connections are closed after this long
pub const EGRESS_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// TLS handshake budget. reqwest has no separate knob; the handshake is bounded
/// by `EGRESS_REQUEST_TIMEOUT`, which is the same value.
pub const EGRESS_TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Expect-continue wait. reqwest never sends `Expect: 100-continue`.
pub const EGRESS_EXPECT_CONTINUE_TIMEOUT: Duration = Duration::from_secs(1);

/// User-Agent sent on outbound requests
pub const EGRESS_USER_AGENT: &str =
    formatcp!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

/// "What is my IP" service, returns the caller's address as plain text
pub const EXTERNAL_IP_URL: &str = "https://api.ipify.org";

/// IP geolocation service, returns a JSON object
pub const IPINFO_URL: &str = "https://ipinfo.io/json";

/// HTTP echo service, returns a JSON object
pub const HTTPBIN_URL: &str = "https://httpbin.org/json";

// =============================================================================
// Identity Resolution Constants
// =============================================================================

/// Placeholder returned when no address can be determined
pub const UNKNOWN_IP: &str = "unknown";

/// Well-known external address used to select the default route. No data is
/// ever sent to it.
pub const ROUTE_PROBE_TARGET: &str = "8.8.8.8:80";

/// Deadline for the default-route probe
pub const ROUTE_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Default Values and Paths
// =============================================================================

pub const DEFAULT_POD_NAME: &str = "unknown-pod";
pub const DEFAULT_NODE_NAME: &str = "unknown-node";
pub const DEFAULT_NAMESPACE: &str = "unknown-namespace";
pub const DEFAULT_PROXY_URL: &str = "http://172.16.28.8:3128";
pub const DEFAULT_PROXY_CONFIG: &str = "HTTP_PROXY and HTTPS_PROXY environment variables";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Listen on all interfaces
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Directory holding the index page
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Index page file name inside the static directory
pub const INDEX_FILE: &str = "index.html";

/// Body served when the index page is missing
pub const INDEX_FALLBACK_BODY: &str = "Demo application is running";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "egress_demo=debug,tower_http=debug";

/// Seconds to wait for open connections on shutdown
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listener settings
    pub http: HttpServerConfig,
    /// Workload identity reported to clients
    pub pod: PodConfig,
    /// Host/pod address resolution settings
    pub identity: IdentityConfig,
    /// Egress proxy settings
    pub proxy: ProxyConfig,
    /// Outbound check targets
    pub checks: EgressTargets,
    /// Directory holding the index page (set from the command line)
    pub static_dir: PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

/// Names injected by the orchestrator (downward API)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodConfig {
    pub pod_name: String,
    pub node_name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Interface whose address is reported as the host IP
    pub host_interface: Option<String>,
    /// Explicit host IP, bypasses all detection
    pub host_ip_override: Option<String>,
    /// Explicit pod IP, bypasses all detection
    pub pod_ip_override: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy URL shown on the index page. Informational only.
    pub display_url: String,
    /// Human-readable description of how the proxy is configured
    pub description: String,
    /// Proxy actually used for outbound requests (`HTTP_PROXY`)
    pub egress_proxy: Option<String>,
}

/// Upstream URLs for the three egress checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressTargets {
    pub external_ip: String,
    pub ipinfo: String,
    pub httpbin: String,
}

impl Default for EgressTargets {
    fn default() -> Self {
        Self {
            external_ip: EXTERNAL_IP_URL.to_string(),
            ipinfo: IPINFO_URL.to_string(),
            httpbin: HTTPBIN_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            http: HttpServerConfig {
                host: DEFAULT_HOST.to_string(),
                port,
            },
            pod: PodConfig {
                pod_name: get_or("POD_NAME", DEFAULT_POD_NAME),
                node_name: get_or("NODE_NAME", DEFAULT_NODE_NAME),
                namespace: get_or("POD_NAMESPACE", DEFAULT_NAMESPACE),
            },
            identity: IdentityConfig {
                host_interface: get("HOST_INTERFACE"),
                host_ip_override: get("HOST_IP"),
                pod_ip_override: get("POD_IP"),
            },
            proxy: ProxyConfig {
                display_url: get_or("PROXY_URL", DEFAULT_PROXY_URL),
                description: get_or("PROXY_CONFIG", DEFAULT_PROXY_CONFIG),
                egress_proxy: get("HTTP_PROXY"),
            },
            checks: EgressTargets::default(),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value '{0}': expected a number between 0 and 65535")]
    InvalidPort(String),
}
