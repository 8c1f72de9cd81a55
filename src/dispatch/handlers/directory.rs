//! Cross-server discovery directory: registration, listing, and heartbeats.
//!
//! The peer-verification handshake itself (dial-back, challenge/response)
//! lives in [`crate::directory`]; this module is the wire-facing front end
//! that decides when to run it and what to do with the result.

use bytes::{Bytes, BytesMut};

use crate::dispatch::context::Context;
use crate::error::{ErrorCode, HandlerError, HandlerResult};
use crate::protocol::frame::PROTOCOL_V1;
use crate::protocol::payloads::directory::{
    Heartbeat, HeartbeatAck, ListServers, RegisterAck, RegisterServer, ServerInfo, ServerList,
};
use crate::protocol::MessageType;
use crate::store::DiscoveredServer;
use crate::telemetry;

fn encode(payload: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut buf = BytesMut::new();
    payload(&mut buf);
    buf.freeze()
}

fn info(s: &DiscoveredServer) -> ServerInfo {
    ServerInfo {
        hostname: s.hostname.clone(),
        port: s.port,
        name: s.name.clone(),
        description: s.description.clone(),
        user_count: s.user_count,
        channel_count: s.channel_count,
        max_users: s.max_users,
        uptime_seconds: s.uptime_seconds,
        is_public: s.is_public,
        heartbeat_interval: s.heartbeat_interval_secs,
        last_heartbeat: s.last_heartbeat.timestamp(),
    }
}

pub fn list_servers(ctx: &Context, _req: ListServers) -> HandlerResult<(MessageType, Bytes)> {
    let servers = ctx
        .store
        .list_directory_servers()
        .iter()
        .filter(|s| s.is_public)
        .map(info)
        .collect();
    let resp = ServerList { servers };
    Ok((MessageType::SERVER_LIST, encode(|b| resp.encode(b))))
}

/// Accepts a registration attempt: acks immediately with `success=false`
/// (the real verdict lands later via the dial-back handshake) and spawns
/// the reachability check in the background.
pub fn register_server(
    ctx: &Context,
    session_id: u64,
    req: RegisterServer,
) -> HandlerResult<(MessageType, Bytes)> {
    if !ctx.config.directory.enabled {
        return Err(HandlerError::new(
            ErrorCode::InvalidInput,
            "this server is not acting as a directory",
        ));
    }
    let source_ip = ctx.sessions.remote_addr(session_id).unwrap_or_default();
    if !ctx.directory_rate_limiter.check(&source_ip) {
        return Err(HandlerError::new(ErrorCode::RateLimited, "too many registration attempts"));
    }

    let store = ctx.store.clone();
    let expected_version = PROTOCOL_V1;
    let hostname = req.hostname.clone();
    let port = req.port;
    tokio::spawn(async move {
        let ok = crate::directory::verify_reachability(&hostname, port, expected_version).await;
        if ok {
            store.upsert_directory_server(DiscoveredServer {
                hostname,
                port,
                name: req.name,
                description: req.description,
                user_count: 0,
                channel_count: 0,
                max_users: req.max_users,
                uptime_seconds: 0,
                is_public: req.is_public,
                heartbeat_interval_secs: crate::directory::adaptive_heartbeat_interval(
                    store.list_directory_servers().len(),
                )
                .as_secs() as u32,
                last_heartbeat: chrono::Utc::now(),
            });
            telemetry::DIRECTORY_SERVERS.set(store.list_directory_servers().len() as i64);
        }
    });

    let resp = RegisterAck {
        success: false,
        message: "Verification in progress".into(),
    };
    Ok((MessageType::REGISTER_ACK, encode(|b| resp.encode(b))))
}

/// Refreshes load counters for a previously registered peer. The wire
/// payload carries only counters, so the sending connection is matched back
/// to its directory row by remote IP (the hostname it originally registered
/// under, since no persistent session-to-row mapping is kept).
pub fn heartbeat(ctx: &Context, session_id: u64, req: Heartbeat) -> HandlerResult<(MessageType, Bytes)> {
    let source = ctx.sessions.remote_addr(session_id).unwrap_or_default();
    let mut servers = ctx.store.list_directory_servers();
    let Some(existing) = servers.iter_mut().find(|s| s.hostname == source) else {
        return Err(HandlerError::new(ErrorCode::ServerNotFound, "server not registered"));
    };
    existing.user_count = req.user_count;
    existing.channel_count = req.channel_count;
    existing.last_heartbeat = chrono::Utc::now();
    let directory_size = servers.len();
    let updated = existing.clone();
    ctx.store.upsert_directory_server(updated);

    let interval = crate::directory::adaptive_heartbeat_interval(directory_size);
    let resp = HeartbeatAck {
        next_interval_seconds: interval.as_secs() as u32,
    };
    Ok((MessageType::HEARTBEAT_ACK, encode(|b| resp.encode(b))))
}
