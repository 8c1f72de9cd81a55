use std::sync::Arc;

use crate::config::Config;
use crate::lifecycle::Lifecycle;
use crate::security::rate_limit::IpRateLimiter;
use crate::session::SessionManager;
use crate::store::Store;

/// Shared state every handler needs. Cloned cheaply (all fields are `Arc`)
/// per connection task, mirroring the gateway's `AppState`.
#[derive(Clone)]
pub struct Context {
    pub store: Arc<Store>,
    pub sessions: Arc<SessionManager>,
    pub config: Arc<Config>,
    pub directory_rate_limiter: Arc<IpRateLimiter>,
    pub lifecycle: Lifecycle,
}

impl Context {
    pub fn new(store: Arc<Store>, sessions: Arc<SessionManager>, config: Arc<Config>) -> Self {
        Self::with_lifecycle(store, sessions, config, Lifecycle::new())
    }

    pub fn with_lifecycle(
        store: Arc<Store>,
        sessions: Arc<SessionManager>,
        config: Arc<Config>,
        lifecycle: Lifecycle,
    ) -> Self {
        let directory_rate_limiter = Arc::new(IpRateLimiter::per_hour(
            config.directory.registrations_per_hour_per_ip,
        ));
        Self {
            store,
            sessions,
            config,
            directory_rate_limiter,
            lifecycle,
        }
    }

    pub fn is_admin_nickname(&self, nickname: &str) -> bool {
        self.config
            .server
            .admin_nicknames
            .iter()
            .any(|n| n == nickname)
    }
}
