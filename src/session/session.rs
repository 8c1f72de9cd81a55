use std::collections::HashSet;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Channel used to push pre-encoded frames to a session's write task. A full
/// channel means the peer is falling behind; the broadcast engine treats a
/// failed send as a dead peer rather than blocking.
pub type SessionSink = mpsc::Sender<Bytes>;

pub const SINK_BUFFER: usize = 256;

/// `(channel_id, subchannel_id)` — `subchannel_id = None` means "the parent
/// channel itself" as opposed to "any subchannel of it".
pub type ChannelSubscription = (u64, Option<u64>);

/// Server-side connection state. Ephemeral: destroyed on disconnect or idle
/// timeout, never persisted.
pub struct Session {
    pub id: u64,
    /// Stable identity across reconnects of the *same logical* client, used
    /// only to correlate log lines; unrelated to the in-memory `id`.
    pub db_session_id: String,
    pub user_id: Option<u64>,
    pub nickname: Option<String>,
    pub user_flags: u8,
    pub shadowbanned: bool,
    pub joined_channel: Option<u64>,
    pub last_activity: DateTime<Utc>,
    pub subscribed_threads: HashSet<u64>,
    pub subscribed_channels: HashSet<ChannelSubscription>,
    pub ephemeral_public_key: Option<[u8; 32]>,
    pub remote_addr: Option<String>,
    pub protocol_version: u8,
    pub sink: SessionSink,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.nickname.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user_flags & crate::store::user::FLAG_ADMIN != 0
    }
}

/// A cheap, cloneable reference used by the broadcast engine so it never
/// needs to hold the session table lock while writing to sockets.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: u64,
    pub protocol_version: u8,
    pub sink: SessionSink,
}
