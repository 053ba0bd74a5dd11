//! egress-demo: pod identity and egress proxy demonstration server.
//!
//! Serves a landing page, a `/api/system` identity endpoint, and three checks
//! that reach external services through the configured egress proxy.

pub mod clock;
pub mod config;
pub mod egress;
pub mod http;
pub mod identity;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::AppConfig;
pub use routes::create_router;
pub use state::AppState;
