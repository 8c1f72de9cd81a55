//! Periodic snapshot of the in-memory [`Store`] to a durable SQLite file.
//!
//! The contract (per the data model) is "some serialization sufficient to
//! reconstruct state bit-identically on startup" — this module is one such
//! serialization, not a live transactional store. Every table is copied
//! under a read lock and written without holding it, so a concurrent
//! mutation observed mid-copy can only ever be reflected a snapshot late.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use super::ban::{Ban, BanTarget};
use super::channel::Channel;
use super::directory::DiscoveredServer;
use super::message::Message;
use super::ssh_key::SshKey;
use super::user::User;
use super::Store;
use crate::error::{StoreError, StoreResult};

pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let snapshot = Self { pool };
        snapshot.ensure_schema().await?;
        Ok(snapshot)
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY, nickname TEXT NOT NULL, password_hash TEXT NOT NULL,
                flags INTEGER NOT NULL, created_at INTEGER NOT NULL, last_seen INTEGER NOT NULL,
                encryption_public_key BLOB
            )",
            "CREATE TABLE IF NOT EXISTS ssh_keys (
                id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL, fingerprint TEXT NOT NULL,
                public_key TEXT NOT NULL, key_type TEXT NOT NULL, label TEXT NOT NULL,
                added_at INTEGER NOT NULL, last_used INTEGER
            )",
            "CREATE TABLE IF NOT EXISTS channels (
                id INTEGER PRIMARY KEY, name TEXT NOT NULL, display_name TEXT NOT NULL,
                description TEXT NOT NULL, channel_type INTEGER NOT NULL, retention_hours INTEGER NOT NULL,
                created_by INTEGER, created_at INTEGER NOT NULL, is_private INTEGER NOT NULL,
                is_dm INTEGER NOT NULL, parent_id INTEGER
            )",
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY, channel_id INTEGER NOT NULL, subchannel_id INTEGER,
                parent_id INTEGER, thread_root_id INTEGER, author_user_id INTEGER,
                author_nickname TEXT NOT NULL, content TEXT NOT NULL, created_at INTEGER NOT NULL,
                edited_at INTEGER, deleted_at INTEGER
            )",
            "CREATE TABLE IF NOT EXISTS bans (
                id INTEGER PRIMARY KEY, target INTEGER NOT NULL, user_id INTEGER, cidr TEXT,
                reason TEXT NOT NULL, shadowban INTEGER NOT NULL, banned_at INTEGER NOT NULL,
                banned_until INTEGER, banned_by TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS directory_servers (
                hostname TEXT NOT NULL, port INTEGER NOT NULL, name TEXT NOT NULL,
                description TEXT NOT NULL, user_count INTEGER NOT NULL, channel_count INTEGER NOT NULL,
                max_users INTEGER NOT NULL, uptime_seconds INTEGER NOT NULL, is_public INTEGER NOT NULL,
                heartbeat_interval INTEGER NOT NULL, last_heartbeat INTEGER NOT NULL,
                PRIMARY KEY (hostname, port)
            )",
        ];
        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }
        Ok(())
    }

    /// Writes every table to the database inside one transaction, replacing
    /// the prior contents wholesale (simpler and fast enough for the scale
    /// this store targets; an incremental diff isn't worth the complexity).
    pub async fn save(&self, store: &Store) -> StoreResult<()> {
        let users = store.all_users();
        let channels = store.list_channels_including_dm();
        let messages = store.all_messages();
        let ssh_keys = store.all_ssh_keys();
        let bans = store.all_bans();
        let servers = store.list_directory_servers();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        for table in [
            "users",
            "ssh_keys",
            "channels",
            "messages",
            "bans",
            "directory_servers",
        ] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        for u in &users {
            sqlx::query(
                "INSERT INTO users (id, nickname, password_hash, flags, created_at, last_seen, encryption_public_key)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(u.id as i64)
            .bind(&u.nickname)
            .bind(&u.password_hash)
            .bind(u.flags as i64)
            .bind(u.created_at.timestamp_millis())
            .bind(u.last_seen.timestamp_millis())
            .bind(u.encryption_public_key.map(|k| k.to_vec()))
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        for k in &ssh_keys {
            sqlx::query(
                "INSERT INTO ssh_keys (id, user_id, fingerprint, public_key, key_type, label, added_at, last_used)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(k.id as i64)
            .bind(k.user_id as i64)
            .bind(&k.fingerprint)
            .bind(&k.public_key)
            .bind(&k.key_type)
            .bind(&k.label)
            .bind(k.added_at.timestamp_millis())
            .bind(k.last_used.map(|t| t.timestamp_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        for c in &channels {
            sqlx::query(
                "INSERT INTO channels (id, name, display_name, description, channel_type, retention_hours,
                 created_by, created_at, is_private, is_dm, parent_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(c.id as i64)
            .bind(&c.name)
            .bind(&c.display_name)
            .bind(&c.description)
            .bind(c.channel_type as i64)
            .bind(c.retention_hours as i64)
            .bind(c.created_by.map(|v| v as i64))
            .bind(c.created_at.timestamp_millis())
            .bind(c.is_private as i64)
            .bind(c.is_dm as i64)
            .bind(c.parent_id.map(|v| v as i64))
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        for m in &messages {
            sqlx::query(
                "INSERT INTO messages (id, channel_id, subchannel_id, parent_id, thread_root_id,
                 author_user_id, author_nickname, content, created_at, edited_at, deleted_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(m.id as i64)
            .bind(m.channel_id as i64)
            .bind(m.subchannel_id.map(|v| v as i64))
            .bind(m.parent_id.map(|v| v as i64))
            .bind(m.thread_root_id.map(|v| v as i64))
            .bind(m.author_user_id.map(|v| v as i64))
            .bind(&m.author_nickname)
            .bind(&m.content)
            .bind(m.created_at.timestamp_millis())
            .bind(m.edited_at.map(|t| t.timestamp_millis()))
            .bind(m.deleted_at.map(|t| t.timestamp_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        for b in &bans {
            sqlx::query(
                "INSERT INTO bans (id, target, user_id, cidr, reason, shadowban, banned_at, banned_until, banned_by)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(b.id as i64)
            .bind(matches!(b.target, BanTarget::Ip) as i64)
            .bind(b.user_id.map(|v| v as i64))
            .bind(&b.cidr)
            .bind(&b.reason)
            .bind(b.shadowban as i64)
            .bind(b.banned_at.timestamp_millis())
            .bind(b.banned_until.map(|t| t.timestamp_millis()))
            .bind(&b.banned_by)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        for s in &servers {
            sqlx::query(
                "INSERT INTO directory_servers (hostname, port, name, description, user_count, channel_count,
                 max_users, uptime_seconds, is_public, heartbeat_interval, last_heartbeat)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&s.hostname)
            .bind(s.port as i64)
            .bind(&s.name)
            .bind(&s.description)
            .bind(s.user_count as i64)
            .bind(s.channel_count as i64)
            .bind(s.max_users as i64)
            .bind(s.uptime_seconds as i64)
            .bind(s.is_public as i64)
            .bind(s.heartbeat_interval_secs as i64)
            .bind(s.last_heartbeat.timestamp_millis())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(
            users = users.len(),
            channels = channels.len(),
            messages = messages.len(),
            "snapshot flushed"
        );
        Ok(())
    }

    /// Reconstructs a fresh [`Store`] from the last successful snapshot.
    pub async fn load(&self) -> StoreResult<Store> {
        let store = Store::new();

        let rows = sqlx::query("SELECT * FROM users")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        for row in rows {
            let id: i64 = row.try_get("id").unwrap_or_default();
            let key: Option<Vec<u8>> = row.try_get("encryption_public_key").unwrap_or_default();
            let user = User {
                id: id as u64,
                nickname: row.try_get("nickname").unwrap_or_default(),
                password_hash: row.try_get("password_hash").unwrap_or_default(),
                flags: row.try_get::<i64, _>("flags").unwrap_or_default() as u8,
                created_at: millis_to_utc(row.try_get("created_at").unwrap_or_default()),
                last_seen: millis_to_utc(row.try_get("last_seen").unwrap_or_default()),
                encryption_public_key: key.and_then(|v| v.try_into().ok()),
            };
            store.restore_user(user);
        }

        let rows = sqlx::query("SELECT * FROM ssh_keys")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        for row in rows {
            let last_used: Option<i64> = row.try_get("last_used").unwrap_or_default();
            let key = SshKey {
                id: row.try_get::<i64, _>("id").unwrap_or_default() as u64,
                user_id: row.try_get::<i64, _>("user_id").unwrap_or_default() as u64,
                fingerprint: row.try_get("fingerprint").unwrap_or_default(),
                public_key: row.try_get("public_key").unwrap_or_default(),
                key_type: row.try_get("key_type").unwrap_or_default(),
                label: row.try_get("label").unwrap_or_default(),
                added_at: millis_to_utc(row.try_get("added_at").unwrap_or_default()),
                last_used: last_used.map(millis_to_utc),
            };
            store.restore_ssh_key(key);
        }

        let rows = sqlx::query("SELECT * FROM channels")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        for row in rows {
            let created_by: Option<i64> = row.try_get("created_by").unwrap_or_default();
            let parent_id: Option<i64> = row.try_get("parent_id").unwrap_or_default();
            let channel = Channel {
                id: row.try_get::<i64, _>("id").unwrap_or_default() as u64,
                name: row.try_get("name").unwrap_or_default(),
                display_name: row.try_get("display_name").unwrap_or_default(),
                description: row.try_get("description").unwrap_or_default(),
                channel_type: row.try_get::<i64, _>("channel_type").unwrap_or_default() as u8,
                retention_hours: row.try_get::<i64, _>("retention_hours").unwrap_or_default() as u32,
                created_by: created_by.map(|v| v as u64),
                created_at: millis_to_utc(row.try_get("created_at").unwrap_or_default()),
                is_private: row.try_get::<i64, _>("is_private").unwrap_or_default() != 0,
                is_dm: row.try_get::<i64, _>("is_dm").unwrap_or_default() != 0,
                parent_id: parent_id.map(|v| v as u64),
            };
            store.restore_channel(channel);
        }

        let rows = sqlx::query("SELECT * FROM messages")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        for row in rows {
            let subchannel_id: Option<i64> = row.try_get("subchannel_id").unwrap_or_default();
            let parent_id: Option<i64> = row.try_get("parent_id").unwrap_or_default();
            let thread_root_id: Option<i64> = row.try_get("thread_root_id").unwrap_or_default();
            let author_user_id: Option<i64> = row.try_get("author_user_id").unwrap_or_default();
            let edited_at: Option<i64> = row.try_get("edited_at").unwrap_or_default();
            let deleted_at: Option<i64> = row.try_get("deleted_at").unwrap_or_default();
            let message = Message {
                id: row.try_get::<i64, _>("id").unwrap_or_default() as u64,
                channel_id: row.try_get::<i64, _>("channel_id").unwrap_or_default() as u64,
                subchannel_id: subchannel_id.map(|v| v as u64),
                parent_id: parent_id.map(|v| v as u64),
                thread_root_id: thread_root_id.map(|v| v as u64),
                author_user_id: author_user_id.map(|v| v as u64),
                author_nickname: row.try_get("author_nickname").unwrap_or_default(),
                content: row.try_get("content").unwrap_or_default(),
                created_at: millis_to_utc(row.try_get("created_at").unwrap_or_default()),
                edited_at: edited_at.map(millis_to_utc),
                deleted_at: deleted_at.map(millis_to_utc),
            };
            store.restore_message(message);
        }

        let rows = sqlx::query("SELECT * FROM bans")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        for row in rows {
            let user_id: Option<i64> = row.try_get("user_id").unwrap_or_default();
            let banned_until: Option<i64> = row.try_get("banned_until").unwrap_or_default();
            let ban = Ban {
                id: row.try_get::<i64, _>("id").unwrap_or_default() as u64,
                target: if row.try_get::<i64, _>("target").unwrap_or_default() != 0 {
                    BanTarget::Ip
                } else {
                    BanTarget::User
                },
                user_id: user_id.map(|v| v as u64),
                cidr: row.try_get("cidr").unwrap_or_default(),
                reason: row.try_get("reason").unwrap_or_default(),
                shadowban: row.try_get::<i64, _>("shadowban").unwrap_or_default() != 0,
                banned_at: millis_to_utc(row.try_get("banned_at").unwrap_or_default()),
                banned_until: banned_until.map(millis_to_utc),
                banned_by: row.try_get("banned_by").unwrap_or_default(),
            };
            store.restore_ban(ban);
        }

        let rows = sqlx::query("SELECT * FROM directory_servers")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        for row in rows {
            let server = DiscoveredServer {
                hostname: row.try_get("hostname").unwrap_or_default(),
                port: row.try_get::<i64, _>("port").unwrap_or_default() as u16,
                name: row.try_get("name").unwrap_or_default(),
                description: row.try_get("description").unwrap_or_default(),
                user_count: row.try_get::<i64, _>("user_count").unwrap_or_default() as u32,
                channel_count: row.try_get::<i64, _>("channel_count").unwrap_or_default() as u32,
                max_users: row.try_get::<i64, _>("max_users").unwrap_or_default() as u32,
                uptime_seconds: row.try_get::<i64, _>("uptime_seconds").unwrap_or_default() as u64,
                is_public: row.try_get::<i64, _>("is_public").unwrap_or_default() != 0,
                heartbeat_interval_secs: row
                    .try_get::<i64, _>("heartbeat_interval")
                    .unwrap_or_default() as u32,
                last_heartbeat: millis_to_utc(row.try_get("last_heartbeat").unwrap_or_default()),
            };
            store.upsert_directory_server(server);
        }

        Ok(store)
    }
}

fn millis_to_utc(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
}
