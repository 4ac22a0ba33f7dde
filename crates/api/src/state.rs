use std::sync::Arc;

use meterdeck_core::rate_limit::RateLimiter;
use meterdeck_db::CredentialStore;

use crate::auth::authority::SessionAuthority;
use crate::config::ServerConfig;
use crate::usage::UsageProvider;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration, including auth settings.
    pub config: Arc<ServerConfig>,
    /// Users, sessions and share-link bookkeeping.
    pub store: Arc<dyn CredentialStore>,
    /// Session/share access decisions and the active login backend.
    pub authority: Arc<SessionAuthority>,
    /// Per-client request counters.
    pub rate_limiter: Arc<RateLimiter>,
    /// Dashboard payload source.
    pub usage: Arc<dyn UsageProvider>,
}

impl AppState {
    /// Wire the authority to `store` according to `config.auth`.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn CredentialStore>,
        usage: Arc<dyn UsageProvider>,
    ) -> Self {
        let authority = SessionAuthority::from_config(&config.auth, Arc::clone(&store));
        Self {
            config: Arc::new(config),
            store,
            authority: Arc::new(authority),
            rate_limiter: Arc::new(RateLimiter::new()),
            usage,
        }
    }
}
