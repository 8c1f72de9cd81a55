//! Authoritative in-memory state: users, channels, messages, sessions-adjacent
//! tables owned here (everything in §3 except the session itself, which
//! belongs to the session manager).
//!
//! Each table is a [`dashmap::DashMap`], generalizing the single
//! `RwLock<HashMap<_, _>>` registries this is grounded on to one lock
//! stripe per table instead of one lock for the whole store.

pub mod ban;
pub mod channel;
pub mod directory;
pub mod dm;
pub mod message;
pub mod snapshot;
pub mod ssh_key;
pub mod user;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

pub use ban::{Ban, BanTarget};
pub use channel::{Channel, ChannelParticipant, DeletedChannel};
pub use directory::DiscoveredServer;
pub use dm::DmInvite;
pub use message::Message;
pub use snapshot::SnapshotStore;
pub use ssh_key::SshKey;
pub use user::User;

use crate::error::{StoreError, StoreResult};

/// Monotonic id allocator shared by every table. A single counter (rather
/// than one per table) keeps ids globally unique, which the snapshot format
/// relies on when cross-referencing entities.
#[derive(Default)]
struct IdAllocator(AtomicU64);

impl IdAllocator {
    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn observe(&self, id: u64) {
        self.0.fetch_max(id, Ordering::Relaxed);
    }
}

pub struct Store {
    ids: IdAllocator,
    users: DashMap<u64, User>,
    users_by_nickname: DashMap<String, u64>,
    ssh_keys: DashMap<u64, SshKey>,
    ssh_keys_by_fingerprint: DashMap<String, u64>,
    channels: DashMap<u64, Channel>,
    dm_participants: DashMap<u64, Vec<ChannelParticipant>>,
    messages: DashMap<u64, Message>,
    bans: DashMap<u64, Ban>,
    dm_invites: DashMap<u64, DmInvite>,
    directory: DashMap<(String, u16), DiscoveredServer>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            ids: IdAllocator::default(),
            users: DashMap::new(),
            users_by_nickname: DashMap::new(),
            ssh_keys: DashMap::new(),
            ssh_keys_by_fingerprint: DashMap::new(),
            channels: DashMap::new(),
            dm_participants: DashMap::new(),
            messages: DashMap::new(),
            bans: DashMap::new(),
            dm_invites: DashMap::new(),
            directory: DashMap::new(),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.ids.next()
    }

    // ---- users ----------------------------------------------------------

    pub fn create_user(
        &self,
        nickname: String,
        password_hash: String,
        flags: u8,
    ) -> StoreResult<User> {
        if !user::is_valid_nickname(&nickname) {
            return Err(StoreError::InvalidInput("invalid nickname".into()));
        }
        if self.users_by_nickname.contains_key(&nickname) {
            return Err(StoreError::NicknameTaken(nickname));
        }
        let now = Utc::now();
        let id = self.next_id();
        let user = User {
            id,
            nickname: nickname.clone(),
            password_hash,
            flags,
            created_at: now,
            last_seen: now,
            encryption_public_key: None,
        };
        self.users.insert(id, user.clone());
        self.users_by_nickname.insert(nickname, id);
        Ok(user)
    }

    pub fn user_by_id(&self, id: u64) -> Option<User> {
        self.users.get(&id).map(|r| r.clone())
    }

    pub fn user_by_nickname(&self, nickname: &str) -> Option<User> {
        let id = *self.users_by_nickname.get(nickname)?;
        self.user_by_id(id)
    }

    pub fn touch_user_last_seen(&self, id: u64) {
        if let Some(mut user) = self.users.get_mut(&id) {
            user.last_seen = Utc::now();
        }
    }

    pub fn set_user_password_hash(&self, id: u64, password_hash: String) -> StoreResult<()> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or(StoreError::UserNotFound(id))?;
        user.password_hash = password_hash;
        Ok(())
    }

    pub fn set_user_encryption_key(&self, id: u64, key: [u8; 32]) -> StoreResult<()> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or(StoreError::UserNotFound(id))?;
        user.encryption_public_key = Some(key);
        Ok(())
    }

    pub fn delete_user(&self, id: u64) -> StoreResult<()> {
        let user = self
            .users
            .remove(&id)
            .ok_or(StoreError::UserNotFound(id))?
            .1;
        self.users_by_nickname.remove(&user.nickname);
        let key_ids: Vec<u64> = self
            .ssh_keys
            .iter()
            .filter(|e| e.value().user_id == id)
            .map(|e| *e.key())
            .collect();
        for key_id in key_ids {
            if let Some((_, key)) = self.ssh_keys.remove(&key_id) {
                self.ssh_keys_by_fingerprint.remove(&key.fingerprint);
            }
        }
        Ok(())
    }

    pub fn all_users(&self) -> Vec<User> {
        self.users.iter().map(|e| e.value().clone()).collect()
    }

    // ---- SSH keys ---------------------------------------------------------

    pub fn add_ssh_key(
        &self,
        user_id: u64,
        fingerprint: String,
        public_key: String,
        key_type: String,
        label: String,
    ) -> StoreResult<SshKey> {
        if self.ssh_keys_by_fingerprint.contains_key(&fingerprint) {
            return Err(StoreError::FingerprintTaken(fingerprint));
        }
        let id = self.next_id();
        let key = SshKey {
            id,
            user_id,
            fingerprint: fingerprint.clone(),
            public_key,
            key_type,
            label,
            added_at: Utc::now(),
            last_used: None,
        };
        self.ssh_keys.insert(id, key.clone());
        self.ssh_keys_by_fingerprint.insert(fingerprint, id);
        Ok(key)
    }

    pub fn ssh_key_by_fingerprint(&self, fingerprint: &str) -> Option<SshKey> {
        let id = *self.ssh_keys_by_fingerprint.get(fingerprint)?;
        self.ssh_keys.get(&id).map(|r| r.clone())
    }

    pub fn ssh_keys_for_user(&self, user_id: u64) -> Vec<SshKey> {
        self.ssh_keys
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn touch_ssh_key_last_used(&self, id: u64) {
        if let Some(mut key) = self.ssh_keys.get_mut(&id) {
            key.last_used = Some(Utc::now());
        }
    }

    pub fn update_ssh_key_label(&self, id: u64, label: String) -> StoreResult<()> {
        let mut key = self
            .ssh_keys
            .get_mut(&id)
            .ok_or(StoreError::SshKeyNotFound(id))?;
        key.label = label;
        Ok(())
    }

    pub fn delete_ssh_key(&self, id: u64) -> StoreResult<()> {
        let (_, key) = self
            .ssh_keys
            .remove(&id)
            .ok_or(StoreError::SshKeyNotFound(id))?;
        self.ssh_keys_by_fingerprint.remove(&key.fingerprint);
        Ok(())
    }

    // ---- channels -----------------------------------------------------

    pub fn create_channel(&self, mut channel: Channel) -> StoreResult<Channel> {
        if let Some(parent_id) = channel.parent_id {
            let parent = self
                .channels
                .get(&parent_id)
                .ok_or(StoreError::ChannelNotFound(parent_id))?;
            if parent.parent_id.is_some() {
                return Err(StoreError::InvalidInput("subchannel nesting depth exceeds 1".into()));
            }
        }
        let name_taken = self.channels.iter().any(|e| {
            e.value().parent_id == channel.parent_id && e.value().name == channel.name
        });
        if name_taken {
            return Err(StoreError::ChannelNameTaken(channel.name.clone()));
        }
        channel.id = self.next_id();
        self.channels.insert(channel.id, channel.clone());
        Ok(channel)
    }

    pub fn channel_by_id(&self, id: u64) -> Option<Channel> {
        self.channels.get(&id).map(|r| r.clone())
    }

    pub fn list_channels(&self) -> Vec<Channel> {
        self.channels
            .iter()
            .filter(|e| !e.value().is_dm)
            .map(|e| e.value().clone())
            .collect()
    }

    /// Cascades to subchannels, messages, DM participants — and returns the
    /// ids swept away so the caller can cascade into the session manager's
    /// subscription indices too (spec: "`DeleteChannel` cascades to
    /// messages, subchannels, subscriptions, participants").
    pub fn delete_channel(&self, id: u64) -> StoreResult<DeletedChannel> {
        self.channels
            .remove(&id)
            .ok_or(StoreError::ChannelNotFound(id))?;
        let subchannel_ids: Vec<u64> = self
            .channels
            .iter()
            .filter(|e| e.value().parent_id == Some(id))
            .map(|e| *e.key())
            .collect();
        for &sub_id in &subchannel_ids {
            self.channels.remove(&sub_id);
        }
        let message_ids: Vec<u64> = self
            .messages
            .iter()
            .filter(|e| e.value().channel_id == id || subchannel_ids.contains(&e.value().channel_id))
            .map(|e| *e.key())
            .collect();
        self.messages
            .retain(|_, m| m.channel_id != id && !subchannel_ids.contains(&m.channel_id));
        self.dm_participants.remove(&id);
        Ok(DeletedChannel {
            channel_id: id,
            subchannel_ids,
            message_ids,
        })
    }

    pub fn dm_participants(&self, channel_id: u64) -> Vec<ChannelParticipant> {
        self.dm_participants
            .get(&channel_id)
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn add_dm_participant(&self, participant: ChannelParticipant) {
        self.dm_participants
            .entry(participant.channel_id)
            .or_default()
            .push(participant);
    }

    /// Removes a participant by session id; deletes the channel outright
    /// once no participants remain.
    pub fn remove_dm_participant(&self, channel_id: u64, session_id: &str) -> StoreResult<bool> {
        let emptied = {
            let mut participants = self
                .dm_participants
                .get_mut(&channel_id)
                .ok_or(StoreError::ChannelNotFound(channel_id))?;
            participants.retain(|p| p.session_id.as_deref() != Some(session_id));
            participants.is_empty()
        };
        if emptied {
            self.dm_participants.remove(&channel_id);
            self.channels.remove(&channel_id);
        }
        Ok(emptied)
    }

    // ---- messages -------------------------------------------------------

    pub fn post_message(&self, mut message: Message) -> Message {
        message.id = self.next_id();
        if message.thread_root_id.is_none() {
            if let Some(parent_id) = message.parent_id {
                // thread_root_id is the outermost ancestor, not the
                // immediate parent: walk up via the parent's own root,
                // falling back to the parent's id if the parent is itself
                // the root (its own thread_root_id is unset).
                message.thread_root_id = Some(
                    self.messages
                        .get(&parent_id)
                        .and_then(|p| p.thread_root_id)
                        .unwrap_or(parent_id),
                );
            }
        }
        self.messages.insert(message.id, message.clone());
        message
    }

    pub fn message_by_id(&self, id: u64) -> Option<Message> {
        self.messages.get(&id).map(|r| r.clone())
    }

    /// Lists messages in `channel_id` (optionally scoped to a subchannel or
    /// thread root), applying at most one of `before_id` / `after_id` as a
    /// cursor. The handler is responsible for rejecting combined use before
    /// calling this. The returned page is always ordered created_at (id)
    /// ascending; `before_id` selects the `limit` messages immediately
    /// preceding the cursor (windowed from the newest end, then reversed
    /// into ascending order), `after_id` (or no cursor at all) selects the
    /// `limit` oldest matching messages.
    pub fn list_messages(
        &self,
        channel_id: u64,
        subchannel_id: Option<u64>,
        parent_id: Option<u64>,
        limit: u32,
        before_id: Option<u64>,
        after_id: Option<u64>,
    ) -> Vec<Message> {
        let mut matches: Vec<Message> = self
            .messages
            .iter()
            .filter(|e| {
                let m = e.value();
                m.channel_id == channel_id
                    && m.subchannel_id == subchannel_id
                    && m.parent_id == parent_id
                    && before_id.is_none_or(|cursor| m.id < cursor)
                    && after_id.is_none_or(|cursor| m.id > cursor)
            })
            .map(|e| e.value().clone())
            .collect();
        if before_id.is_some() {
            matches.sort_by(|a, b| b.id.cmp(&a.id));
            matches.truncate(limit as usize);
            matches.reverse();
        } else {
            matches.sort_by(|a, b| a.id.cmp(&b.id));
            matches.truncate(limit as usize);
        }
        matches
    }

    pub fn edit_message(&self, id: u64, content: String) -> StoreResult<Message> {
        let mut message = self
            .messages
            .get_mut(&id)
            .ok_or(StoreError::MessageNotFound(id))?;
        message.content = content;
        message.edited_at = Some(Utc::now());
        Ok(message.clone())
    }

    pub fn delete_message(&self, id: u64) -> StoreResult<Message> {
        let mut message = self
            .messages
            .get_mut(&id)
            .ok_or(StoreError::MessageNotFound(id))?;
        message.deleted_at = Some(Utc::now());
        Ok(message.clone())
    }

    /// Removes messages older than their channel's retention window. Called
    /// by the periodic retention task.
    pub fn expire_messages(&self) -> usize {
        let now = Utc::now();
        let retention_by_channel: std::collections::HashMap<u64, u32> = self
            .channels
            .iter()
            .map(|e| (*e.key(), e.value().retention_hours))
            .collect();
        let before = self.messages.len();
        self.messages.retain(|_, m| {
            let Some(&hours) = retention_by_channel.get(&m.channel_id) else {
                return true;
            };
            if hours == 0 {
                return true;
            }
            now - m.created_at < chrono::Duration::hours(hours as i64)
        });
        before - self.messages.len()
    }

    // ---- bans -------------------------------------------------------------

    pub fn create_ban(&self, mut ban: Ban) -> Ban {
        ban.id = self.next_id();
        self.bans.insert(ban.id, ban.clone());
        ban
    }

    pub fn active_bans(&self) -> Vec<Ban> {
        let now = Utc::now();
        self.bans
            .iter()
            .filter(|e| e.value().is_active(now))
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn unban_user(&self, user_id: u64) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        let ids: Vec<u64> = self
            .bans
            .iter()
            .filter(|e| {
                e.value().user_id == Some(user_id) && e.value().is_active(now)
            })
            .map(|e| *e.key())
            .collect();
        for id in ids {
            self.bans.remove(&id);
            removed += 1;
        }
        removed
    }

    /// Looks up the active ban (if any) blocking `user_id`/`nickname` from
    /// authenticating, checking a direct user-id match first and falling
    /// back to resolving `nickname` to a user id. Expired and lifted bans
    /// are never returned.
    pub fn get_active_ban_for_user(&self, user_id: Option<u64>, nickname: Option<&str>) -> Option<Ban> {
        let now = Utc::now();
        let lookup = |uid: u64| {
            self.bans
                .iter()
                .find(|e| {
                    e.value().target == BanTarget::User
                        && e.value().user_id == Some(uid)
                        && e.value().is_active(now)
                })
                .map(|e| e.value().clone())
        };
        if let Some(uid) = user_id {
            if let Some(ban) = lookup(uid) {
                return Some(ban);
            }
        }
        if let Some(name) = nickname {
            if let Some(user) = self.user_by_nickname(name) {
                if let Some(ban) = lookup(user.id) {
                    return Some(ban);
                }
            }
        }
        None
    }

    pub fn unban_ip(&self, cidr: &str) -> usize {
        let now = Utc::now();
        let ids: Vec<u64> = self
            .bans
            .iter()
            .filter(|e| {
                e.value().cidr.as_deref() == Some(cidr) && e.value().is_active(now)
            })
            .map(|e| *e.key())
            .collect();
        let removed = ids.len();
        for id in ids {
            self.bans.remove(&id);
        }
        removed
    }

    // ---- DM invites ---------------------------------------------------

    pub fn create_dm_invite(&self, mut invite: DmInvite) -> DmInvite {
        invite.id = self.next_id();
        self.dm_invites.insert(invite.id, invite.clone());
        invite
    }

    pub fn take_dm_invite(&self, id: u64) -> Option<DmInvite> {
        self.dm_invites.remove(&id).map(|(_, invite)| invite)
    }

    /// Invites touching `user_id`, scanned linearly per the source behavior;
    /// a large deployment would want an index from user id to invite ids.
    pub fn pending_dm_invites_for_user(&self, user_id: u64) -> Vec<DmInvite> {
        self.dm_invites
            .iter()
            .filter(|e| {
                e.value().initiator_user_id == Some(user_id)
                    || e.value().target_user_id == Some(user_id)
            })
            .map(|e| e.value().clone())
            .collect()
    }

    // ---- directory ------------------------------------------------------

    pub fn upsert_directory_server(&self, server: DiscoveredServer) {
        self.directory.insert(server.key(), server);
    }

    pub fn list_directory_servers(&self) -> Vec<DiscoveredServer> {
        self.directory.iter().map(|e| e.value().clone()).collect()
    }

    pub fn remove_stale_directory_servers(&self, grace_periods: u32) -> usize {
        let now = Utc::now();
        let before = self.directory.len();
        self.directory
            .retain(|_, s| !s.is_stale(now, grace_periods));
        before - self.directory.len()
    }

    /// Restores the allocator high-water mark after loading a snapshot.
    pub fn observe_id(&self, id: u64) {
        self.ids.observe(id);
    }

    // ---- snapshot plumbing ------------------------------------------------

    pub fn list_channels_including_dm(&self) -> Vec<Channel> {
        self.channels.iter().map(|e| e.value().clone()).collect()
    }

    pub fn all_messages(&self) -> Vec<Message> {
        self.messages.iter().map(|e| e.value().clone()).collect()
    }

    pub fn all_ssh_keys(&self) -> Vec<SshKey> {
        self.ssh_keys.iter().map(|e| e.value().clone()).collect()
    }

    pub fn all_bans(&self) -> Vec<Ban> {
        self.bans.iter().map(|e| e.value().clone()).collect()
    }

    pub fn restore_user(&self, user: User) {
        self.observe_id(user.id);
        self.users_by_nickname.insert(user.nickname.clone(), user.id);
        self.users.insert(user.id, user);
    }

    pub fn restore_ssh_key(&self, key: SshKey) {
        self.observe_id(key.id);
        self.ssh_keys_by_fingerprint
            .insert(key.fingerprint.clone(), key.id);
        self.ssh_keys.insert(key.id, key);
    }

    pub fn restore_channel(&self, channel: Channel) {
        self.observe_id(channel.id);
        self.channels.insert(channel.id, channel);
    }

    pub fn restore_message(&self, message: Message) {
        self.observe_id(message.id);
        self.messages.insert(message.id, message);
    }

    pub fn restore_ban(&self, ban: Ban) {
        self.observe_id(ban.id);
        self.bans.insert(ban.id, ban);
    }
}
