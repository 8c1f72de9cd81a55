use chrono::{DateTime, Utc};

/// A pending DM consent negotiation, consumed on accept/decline.
#[derive(Debug, Clone)]
pub struct DmInvite {
    pub id: u64,
    pub channel_id: u64,
    pub initiator_user_id: Option<u64>,
    pub initiator_session_id: Option<String>,
    pub target_user_id: Option<u64>,
    pub target_session_id: Option<String>,
    pub is_encrypted_intent: bool,
    pub created_at: DateTime<Utc>,
}
