//! Periodic cleanup: message retention sweep, idle session expiry, and stale
//! directory peer pruning, all on one `tokio::time::interval` ticker.
//!
//! Grounded on the gateway's `pruning.rs` background task, which does the
//! equivalent on a timer: wake, sweep one or more tables, log what moved.

use std::sync::Arc;
use std::time::Duration;

use crate::lifecycle::Lifecycle;
use crate::session::SessionManager;
use crate::store::Store;

pub struct RetentionTask {
    store: Arc<Store>,
    sessions: Arc<SessionManager>,
    sweep_interval: Duration,
    idle_timeout_seconds: i64,
    lifecycle: Lifecycle,
}

impl RetentionTask {
    pub fn new(
        store: Arc<Store>,
        sessions: Arc<SessionManager>,
        sweep_interval: Duration,
        idle_timeout_seconds: i64,
        lifecycle: Lifecycle,
    ) -> Self {
        Self {
            store,
            sessions,
            sweep_interval,
            idle_timeout_seconds,
            lifecycle,
        }
    }

    /// Runs until shutdown is signalled; intended to be spawned once at startup.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        let mut shutdown = self.lifecycle.subscribe();
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => {
                    tracing::info!("retention task shutting down");
                    break;
                }
            }
            let expired_messages = self.store.expire_messages();
            let expired_sessions = self.sessions.expire_idle(self.idle_timeout_seconds);
            let stale_peers = self.store.remove_stale_directory_servers(3);
            tracing::debug!(
                expired_messages,
                expired_sessions = expired_sessions.len(),
                stale_peers,
                "retention sweep complete"
            );
        }
    }
}
