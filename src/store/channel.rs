use chrono::{DateTime, Utc};

pub const CHANNEL_TYPE_CHAT: u8 = 0;
pub const CHANNEL_TYPE_FORUM: u8 = 1;

#[derive(Debug, Clone)]
pub struct Channel {
    pub id: u64,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub channel_type: u8,
    pub retention_hours: u32,
    pub created_by: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub is_private: bool,
    pub is_dm: bool,
    pub parent_id: Option<u64>,
}

impl Channel {
    pub fn is_forum(&self) -> bool {
        self.channel_type == CHANNEL_TYPE_FORUM
    }

    pub fn is_subchannel(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// What a channel deletion swept away, handed back so the dispatcher can
/// cascade the cleanup into `SessionManager`'s subscription reverse indices
/// (the store has no reference to sessions, so it can only report what it
/// removed).
#[derive(Debug, Clone, Default)]
pub struct DeletedChannel {
    pub channel_id: u64,
    pub subchannel_ids: Vec<u64>,
    pub message_ids: Vec<u64>,
}

/// DM participant — at least one of `user_id`/`session_id` is set.
#[derive(Debug, Clone)]
pub struct ChannelParticipant {
    pub channel_id: u64,
    pub user_id: Option<u64>,
    pub session_id: Option<String>,
    pub nickname: String,
}
