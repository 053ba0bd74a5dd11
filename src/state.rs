//! Shared application state for request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::egress::{EgressChecks, EgressClient};
use crate::identity::IdentityResolver;

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Everything here is read-only after startup: the configuration, the identity
/// resolver, the pooled egress client and the three check definitions.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub identity: IdentityResolver,
    pub egress: EgressClient,
    pub checks: Arc<EgressChecks>,
}

impl AppState {
    /// Creates the state from configuration, using the system interfaces for
    /// identity resolution.
    pub fn new(config: AppConfig) -> Self {
        let identity = IdentityResolver::new(config.identity.clone());
        Self::with_identity(config, identity)
    }

    /// Creates the state with a caller-supplied identity resolver.
    pub fn with_identity(config: AppConfig, identity: IdentityResolver) -> Self {
        let egress = EgressClient::new(&config.proxy);
        let checks = EgressChecks::from_targets(&config.checks);

        Self {
            config: Arc::new(config),
            identity,
            egress,
            checks: Arc::new(checks),
        }
    }
}
