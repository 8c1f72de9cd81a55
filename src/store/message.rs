use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Message {
    pub id: u64,
    pub channel_id: u64,
    pub subchannel_id: Option<u64>,
    pub parent_id: Option<u64>,
    pub thread_root_id: Option<u64>,
    pub author_user_id: Option<u64>,
    pub author_nickname: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    /// `author_user_id == None` means the message was posted anonymously and
    /// is displayed with a `~` prefix on the nickname by the client.
    pub fn is_anonymous(&self) -> bool {
        self.author_user_id.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
