use chrono::{DateTime, Utc};

/// A peer server known to this directory, uniquely keyed by `(hostname, port)`.
#[derive(Debug, Clone)]
pub struct DiscoveredServer {
    pub hostname: String,
    pub port: u16,
    pub name: String,
    pub description: String,
    pub user_count: u32,
    pub channel_count: u32,
    pub max_users: u32,
    pub uptime_seconds: u64,
    pub is_public: bool,
    pub heartbeat_interval_secs: u32,
    pub last_heartbeat: DateTime<Utc>,
}

impl DiscoveredServer {
    pub fn key(&self) -> (String, u16) {
        (self.hostname.clone(), self.port)
    }

    pub fn is_stale(&self, now: DateTime<Utc>, grace_periods: u32) -> bool {
        let grace = chrono::Duration::seconds(
            self.heartbeat_interval_secs as i64 * grace_periods.max(1) as i64,
        );
        now - self.last_heartbeat > grace
    }
}
