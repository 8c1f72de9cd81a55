//! Session lifecycle and subscription registries.
//!
//! Generalizes the gateway's `NodeRegistry` (one `RwLock<HashMap<String,
//! ConnectedNode>>` keyed by node id, pushing frames through a per-node
//! `mpsc::Sender`) to per-session state plus two *reverse* indices —
//! thread id and channel/subchannel id → subscriber set — so the broadcast
//! engine can look up recipients in O(1) instead of scanning every session.

pub mod session;

use std::collections::HashSet;

use chrono::Utc;
use dashmap::{DashMap, DashSet};

pub use session::{ChannelSubscription, Session, SessionHandle, SessionSink, SINK_BUFFER};

use crate::error::{StoreError, StoreResult};

/// Owns all live [`Session`]s plus the reverse subscription indices.
///
/// Cyclic reference avoidance: the indices are keyed by session *id*, not by
/// a pointer to the session, and are always resolved back through `sessions`
/// — there is no direct session ↔ index cycle.
pub struct SessionManager {
    sessions: DashMap<u64, Session>,
    next_id: std::sync::atomic::AtomicU64,
    thread_subscribers: DashMap<u64, DashSet<u64>>,
    channel_subscribers: DashMap<ChannelSubscription, DashSet<u64>>,
    max_thread_subscriptions: usize,
    max_channel_subscriptions: usize,
}

impl SessionManager {
    pub fn new(max_thread_subscriptions: usize, max_channel_subscriptions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: std::sync::atomic::AtomicU64::new(1),
            thread_subscribers: DashMap::new(),
            channel_subscribers: DashMap::new(),
            max_thread_subscriptions,
            max_channel_subscriptions,
        }
    }

    pub fn create_session(
        &self,
        db_session_id: String,
        remote_addr: Option<String>,
        protocol_version: u8,
        sink: SessionSink,
    ) -> u64 {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let session = Session {
            id,
            db_session_id,
            user_id: None,
            nickname: None,
            user_flags: 0,
            shadowbanned: false,
            joined_channel: None,
            last_activity: Utc::now(),
            subscribed_threads: HashSet::new(),
            subscribed_channels: HashSet::new(),
            ephemeral_public_key: None,
            remote_addr,
            protocol_version,
            sink,
        };
        self.sessions.insert(id, session);
        id
    }

    /// Removes a session and every trace of it from the reverse indices.
    pub fn remove_session(&self, id: u64) {
        if let Some((_, session)) = self.sessions.remove(&id) {
            for thread_id in session.subscribed_threads {
                if let Some(set) = self.thread_subscribers.get(&thread_id) {
                    set.remove(&id);
                }
            }
            for sub in session.subscribed_channels {
                if let Some(set) = self.channel_subscribers.get(&sub) {
                    set.remove(&id);
                }
            }
        }
    }

    pub fn handle(&self, id: u64) -> Option<SessionHandle> {
        self.sessions.get(&id).map(|s| SessionHandle {
            id: s.id,
            protocol_version: s.protocol_version,
            sink: s.sink.clone(),
        })
    }

    pub fn touch_activity(&self, id: u64) {
        if let Some(mut s) = self.sessions.get_mut(&id) {
            s.last_activity = Utc::now();
        }
    }

    pub fn set_identity(&self, id: u64, user_id: Option<u64>, nickname: String, flags: u8) -> StoreResult<()> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        session.user_id = user_id;
        session.nickname = Some(nickname);
        session.user_flags = flags;
        Ok(())
    }

    pub fn set_shadowbanned(&self, id: u64, shadowbanned: bool) -> StoreResult<()> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        session.shadowbanned = shadowbanned;
        Ok(())
    }

    pub fn set_ephemeral_public_key(&self, id: u64, key: [u8; 32]) -> StoreResult<()> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        session.ephemeral_public_key = Some(key);
        Ok(())
    }

    /// Sets the session's current channel. The handler is responsible for
    /// emitting the leave-then-join presence pair; this only updates state.
    pub fn set_joined_channel(&self, id: u64, channel_id: Option<u64>) -> StoreResult<Option<u64>> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        let previous = session.joined_channel;
        session.joined_channel = channel_id;
        Ok(previous)
    }

    pub fn nickname(&self, id: u64) -> Option<String> {
        self.sessions.get(&id).and_then(|s| s.nickname.clone())
    }

    pub fn user_id(&self, id: u64) -> Option<u64> {
        self.sessions.get(&id).and_then(|s| s.user_id)
    }

    pub fn flags(&self, id: u64) -> u8 {
        self.sessions.get(&id).map(|s| s.user_flags).unwrap_or(0)
    }

    pub fn is_shadowbanned(&self, id: u64) -> bool {
        self.sessions.get(&id).map(|s| s.shadowbanned).unwrap_or(false)
    }

    pub fn ephemeral_public_key(&self, id: u64) -> Option<[u8; 32]> {
        self.sessions.get(&id).and_then(|s| s.ephemeral_public_key)
    }

    pub fn remote_addr(&self, id: u64) -> Option<String> {
        self.sessions.get(&id).and_then(|s| s.remote_addr.clone())
    }

    /// Linear scan by nickname: the session table is keyed by id, and
    /// nicknames only need to resolve to a session on the (comparatively
    /// rare) path of starting a DM, so an extra index isn't worth it yet.
    pub fn find_by_nickname(&self, nickname: &str) -> Option<u64> {
        self.sessions
            .iter()
            .find(|e| e.value().nickname.as_deref() == Some(nickname))
            .map(|e| *e.key())
    }

    /// Finds the live session currently authenticated as `user_id`, used to
    /// resolve a DM invite's stored user id back to a connection. Returns
    /// `None` if that account isn't currently online.
    pub fn find_by_user_id(&self, user_id: u64) -> Option<u64> {
        self.sessions
            .iter()
            .find(|e| e.value().user_id == Some(user_id))
            .map(|e| *e.key())
    }

    pub fn thread_subscription_count(&self, id: u64) -> usize {
        self.sessions
            .get(&id)
            .map(|s| s.subscribed_threads.len())
            .unwrap_or(0)
    }

    pub fn channel_subscription_count(&self, id: u64) -> usize {
        self.sessions
            .get(&id)
            .map(|s| s.subscribed_channels.len())
            .unwrap_or(0)
    }

    pub fn subscribe_thread(&self, id: u64, thread_id: u64) -> StoreResult<()> {
        if self.thread_subscription_count(id) >= self.max_thread_subscriptions {
            return Err(StoreError::SubscriptionLimit);
        }
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        session.subscribed_threads.insert(thread_id);
        drop(session);
        self.thread_subscribers
            .entry(thread_id)
            .or_default()
            .insert(id);
        Ok(())
    }

    pub fn unsubscribe_thread(&self, id: u64, thread_id: u64) -> StoreResult<()> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        session.subscribed_threads.remove(&thread_id);
        drop(session);
        if let Some(set) = self.thread_subscribers.get(&thread_id) {
            set.remove(&id);
        }
        Ok(())
    }

    pub fn subscribe_channel(&self, id: u64, sub: ChannelSubscription) -> StoreResult<()> {
        if self.channel_subscription_count(id) >= self.max_channel_subscriptions {
            return Err(StoreError::SubscriptionLimit);
        }
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        session.subscribed_channels.insert(sub);
        drop(session);
        self.channel_subscribers.entry(sub).or_default().insert(id);
        Ok(())
    }

    pub fn unsubscribe_channel(&self, id: u64, sub: ChannelSubscription) -> StoreResult<()> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        session.subscribed_channels.remove(&sub);
        drop(session);
        if let Some(set) = self.channel_subscribers.get(&sub) {
            set.remove(&id);
        }
        Ok(())
    }

    /// All session handles currently subscribed to `thread_id`. O(1) lookup
    /// plus O(subscribers) handle materialization.
    pub fn thread_subscriber_handles(&self, thread_id: u64) -> Vec<SessionHandle> {
        let Some(ids) = self.thread_subscribers.get(&thread_id) else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| self.handle(*id)).collect()
    }

    pub fn channel_subscriber_handles(&self, sub: ChannelSubscription) -> Vec<SessionHandle> {
        let Some(ids) = self.channel_subscribers.get(&sub) else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| self.handle(*id)).collect()
    }

    /// Every session currently joined to `channel_id`, used for presence and
    /// channel-wide broadcasts that aren't subscription-gated.
    pub fn sessions_in_channel(&self, channel_id: u64) -> Vec<SessionHandle> {
        self.sessions
            .iter()
            .filter(|e| e.value().joined_channel == Some(channel_id))
            .filter_map(|e| self.handle(*e.key()))
            .collect()
    }

    pub fn all_session_handles(&self) -> Vec<SessionHandle> {
        self.sessions.iter().filter_map(|e| self.handle(*e.key())).collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Tears down every subscription — channel-level (for the channel
    /// itself and each of its subchannels) and thread-level (for each
    /// message id that could have been subscribed to as a thread root) —
    /// left dangling by a channel deletion. Updates both the reverse
    /// indices and each affected session's own subscription sets.
    pub fn purge_channel_subscriptions(&self, channel_id: u64, subchannel_ids: &[u64], message_ids: &[u64]) {
        let mut subs: Vec<ChannelSubscription> = vec![(channel_id, None)];
        subs.extend(subchannel_ids.iter().map(|&sub_id| (channel_id, Some(sub_id))));
        for sub in subs {
            if let Some((_, set)) = self.channel_subscribers.remove(&sub) {
                for session_id in set.iter() {
                    let session_id = *session_id;
                    if let Some(mut session) = self.sessions.get_mut(&session_id) {
                        session.subscribed_channels.remove(&sub);
                    }
                }
            }
        }
        for &message_id in message_ids {
            if let Some((_, set)) = self.thread_subscribers.remove(&message_id) {
                for session_id in set.iter() {
                    let session_id = *session_id;
                    if let Some(mut session) = self.sessions.get_mut(&session_id) {
                        session.subscribed_threads.remove(&message_id);
                    }
                }
            }
        }
    }

    /// Sweeps sessions idle past `timeout_seconds`, returning their ids so
    /// the caller can close the underlying transport.
    pub fn expire_idle(&self, timeout_seconds: i64) -> Vec<u64> {
        let now = Utc::now();
        let expired: Vec<u64> = self
            .sessions
            .iter()
            .filter(|e| {
                (now - e.value().last_activity).num_seconds() >= timeout_seconds
            })
            .map(|e| *e.key())
            .collect();
        for id in &expired {
            self.remove_session(*id);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> SessionSink {
        tokio::sync::mpsc::channel(SINK_BUFFER).0
    }

    #[test]
    fn subscribe_and_lookup_round_trips() {
        let mgr = SessionManager::new(100, 100);
        let id = mgr.create_session("db1".into(), None, 2, sink());
        mgr.subscribe_thread(id, 42).unwrap();
        let handles = mgr.thread_subscriber_handles(42);
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].id, id);
    }

    #[test]
    fn remove_session_clears_reverse_index() {
        let mgr = SessionManager::new(100, 100);
        let id = mgr.create_session("db1".into(), None, 2, sink());
        mgr.subscribe_channel(id, (7, None)).unwrap();
        mgr.remove_session(id);
        assert!(mgr.channel_subscriber_handles((7, None)).is_empty());
    }

    #[test]
    fn thread_subscription_limit_enforced_independently_of_channel_cap() {
        let mgr = SessionManager::new(1, 10);
        let id = mgr.create_session("db1".into(), None, 2, sink());
        mgr.subscribe_thread(id, 1).unwrap();
        assert!(mgr.subscribe_thread(id, 2).is_err());
        // The channel cap is untouched by a full thread cap.
        assert!(mgr.subscribe_channel(id, (7, None)).is_ok());
    }

    #[test]
    fn channel_subscription_limit_enforced_independently_of_thread_cap() {
        let mgr = SessionManager::new(10, 1);
        let id = mgr.create_session("db1".into(), None, 2, sink());
        mgr.subscribe_channel(id, (7, None)).unwrap();
        assert!(mgr.subscribe_channel(id, (8, None)).is_err());
        assert!(mgr.subscribe_thread(id, 1).is_ok());
    }
}
