//! egress-demo: pod identity and egress proxy demonstration server.
//!
//! This is the application entry point. It initializes tracing, reads the
//! configuration from the environment, builds the shared egress client, sets
//! up the Axum router and starts the HTTP server.

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use egress_demo::config::{AppConfig, DEFAULT_LOG_FILTER};
use egress_demo::http::start_server;
use egress_demo::{create_router, AppState};

/// Log output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// egress-demo: reports pod network identity and tests egress through a proxy
#[derive(Parser, Debug)]
#[command(name = "egress-demo", version, about)]
struct Args {
    /// Log level filter (e.g., "egress_demo=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    match args.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }

    let config = AppConfig::from_env()?;

    tracing::info!(
        pod = %config.pod.pod_name,
        namespace = %config.pod.namespace,
        node = %config.pod.node_name,
        "Starting egress-demo server"
    );
    tracing::info!(
        proxy_url = %config.proxy.display_url,
        proxy_config = %config.proxy.description,
        egress_proxy = ?config.proxy.egress_proxy,
        "Loaded proxy configuration"
    );
    tracing::debug!(
        host_interface = ?config.identity.host_interface,
        host_ip_override = ?config.identity.host_ip_override,
        pod_ip_override = ?config.identity.pod_ip_override,
        static_dir = %config.static_dir.display(),
        "Loaded identity configuration"
    );

    let http_config = config.http.clone();
    let state = AppState::new(config);
    if !state.egress.is_ready() {
        tracing::warn!("Egress client unavailable, /api egress checks will return errors");
    }

    let app = create_router(state);
    start_server(app, &http_config).await?;

    Ok(())
}
