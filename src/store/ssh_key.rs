use chrono::{DateTime, Utc};

/// A public key bound to a user, keyed globally by its SHA-256 fingerprint.
#[derive(Debug, Clone)]
pub struct SshKey {
    pub id: u64,
    pub user_id: u64,
    pub fingerprint: String,
    pub public_key: String,
    pub key_type: String,
    pub label: String,
    pub added_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}
