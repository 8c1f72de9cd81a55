//! Admin command surface: ban/unban, ban listing, and account deletion.
//!
//! Thin CRUD over the ban table and user store; all operations require the
//! calling session to carry [`FLAG_ADMIN`].

use bytes::{Bytes, BytesMut};
use chrono::Utc;

use crate::dispatch::context::Context;
use crate::error::{ErrorCode, HandlerError, HandlerResult};
use crate::protocol::payloads::admin::{
    AdminResponse, BanInfo, BanIp, BanList, BanUser, DeleteUser, ListBans, UnbanIp, UnbanUser,
};
use crate::protocol::MessageType;
use crate::store::ban::{Ban, BanTarget};
use crate::store::user::FLAG_ADMIN;

fn encode(payload: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut buf = BytesMut::new();
    payload(&mut buf);
    buf.freeze()
}

fn require_admin(ctx: &Context, session_id: u64) -> HandlerResult<String> {
    if ctx.sessions.flags(session_id) & FLAG_ADMIN == 0 {
        return Err(HandlerError::new(ErrorCode::AdminRequired, "admin privileges required"));
    }
    Ok(ctx.sessions.nickname(session_id).unwrap_or_else(|| "admin".into()))
}

fn response(success: bool, message: impl Into<String>) -> (MessageType, Bytes) {
    let resp = AdminResponse {
        success,
        message: message.into(),
    };
    (MessageType::ADMIN_RESPONSE, encode(|b| resp.encode(b)))
}

fn bans_info(target: BanTarget) -> impl Fn(&Ban) -> Option<BanInfo> {
    move |b: &Ban| {
        if b.target != target {
            return None;
        }
        Some(BanInfo {
            id: b.id,
            target: match b.target {
                BanTarget::User => 0,
                BanTarget::Ip => 1,
            },
            user_id: b.user_id,
            ip: b.cidr.clone(),
            reason: b.reason.clone(),
            banned_by: b.banned_by.clone(),
            banned_at: b.banned_at.timestamp(),
            expires_at: b.banned_until.map(|t| t.timestamp()),
        })
    }
}

pub fn ban_user(ctx: &Context, session_id: u64, req: BanUser) -> HandlerResult<(MessageType, Bytes)> {
    let admin_name = require_admin(ctx, session_id)?;
    ctx.store.create_ban(Ban {
        id: 0,
        target: BanTarget::User,
        user_id: Some(req.user_id),
        cidr: None,
        reason: req.reason,
        shadowban: false,
        banned_at: Utc::now(),
        banned_until: req
            .duration_seconds
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs as i64)),
        banned_by: admin_name,
    });
    if let Some(target_session) = ctx.sessions.find_by_user_id(req.user_id) {
        ctx.sessions.remove_session(target_session);
    }
    Ok(response(true, "user banned"))
}

pub fn ban_ip(ctx: &Context, session_id: u64, req: BanIp) -> HandlerResult<(MessageType, Bytes)> {
    let admin_name = require_admin(ctx, session_id)?;
    ctx.store.create_ban(Ban {
        id: 0,
        target: BanTarget::Ip,
        user_id: None,
        cidr: Some(req.ip),
        reason: req.reason,
        shadowban: false,
        banned_at: Utc::now(),
        banned_until: req
            .duration_seconds
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs as i64)),
        banned_by: admin_name,
    });
    Ok(response(true, "ip banned"))
}

pub fn unban_user(ctx: &Context, session_id: u64, req: UnbanUser) -> HandlerResult<(MessageType, Bytes)> {
    require_admin(ctx, session_id)?;
    let removed = ctx.store.unban_user(req.user_id);
    Ok(response(removed > 0, format!("{removed} ban(s) removed")))
}

pub fn unban_ip(ctx: &Context, session_id: u64, req: UnbanIp) -> HandlerResult<(MessageType, Bytes)> {
    require_admin(ctx, session_id)?;
    let removed = ctx.store.unban_ip(&req.ip);
    Ok(response(removed > 0, format!("{removed} ban(s) removed")))
}

pub fn list_bans(ctx: &Context, session_id: u64, _req: ListBans) -> HandlerResult<(MessageType, Bytes)> {
    require_admin(ctx, session_id)?;
    let active = ctx.store.active_bans();
    let user_bans = active.iter().filter_map(bans_info(BanTarget::User));
    let ip_bans = active.iter().filter_map(bans_info(BanTarget::Ip));
    let bans = user_bans.chain(ip_bans).collect();
    let resp = BanList { bans };
    Ok((MessageType::BAN_LIST, encode(|b| resp.encode(b))))
}

pub fn delete_user(ctx: &Context, session_id: u64, req: DeleteUser) -> HandlerResult<(MessageType, Bytes)> {
    require_admin(ctx, session_id)?;
    if let Some(target_session) = ctx.sessions.find_by_user_id(req.user_id) {
        ctx.sessions.remove_session(target_session);
    }
    match ctx.store.delete_user(req.user_id) {
        Ok(()) => Ok(response(true, "user deleted")),
        Err(e) => Ok(response(false, e.to_string())),
    }
}
