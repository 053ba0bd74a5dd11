//! HTTP server module.
//!
//! Plain HTTP only: TLS for the demo is terminated by the cluster ingress.
//! The server drains connections gracefully on SIGTERM/SIGINT.

mod server;
mod shutdown;

pub use server::{start_server, ServerError};
