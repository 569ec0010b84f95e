//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::hub::{ConnectionHub, Dispatcher, HubConfig, IdentityResolver, TrustedClaims};
use crate::triggers::EventTrigger;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Live connections and room membership
    pub hub: Arc<ConnectionHub>,
    /// Typed entry point for booking/library/notification events
    pub triggers: EventTrigger,
    /// Turns client-claimed identities into trusted ones
    pub identity_resolver: Arc<dyn IdentityResolver>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create state with a fresh hub. Client identity claims are trusted as-is.
    pub fn new(config: ApiConfig, hub_config: HubConfig) -> Self {
        let hub = Arc::new(ConnectionHub::new(hub_config));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&hub)));
        Self {
            hub,
            triggers: EventTrigger::new(dispatcher),
            identity_resolver: Arc::new(TrustedClaims),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Replace the identity resolver (e.g. one that verifies session tokens)
    pub fn with_identity_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.identity_resolver = resolver;
        self
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
