//! User lookups and online-user listings (not to be confused with the
//! channel/server join-leave presence events broadcast from `channels.rs`
//! and `identity.rs`).

use bytes::{Bytes, BytesMut};

use crate::dispatch::context::Context;
use crate::error::{ErrorCode, HandlerError, HandlerResult};
use crate::protocol::payloads::presence::{
    ChannelUserList, GetUserInfo, ListChannelUsers, ListUsers, UserInfo, UserList, UserSummary,
};
use crate::protocol::MessageType;

fn encode(payload: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut buf = BytesMut::new();
    payload(&mut buf);
    buf.freeze()
}

fn not_found(message: &str) -> UserInfo {
    UserInfo {
        success: false,
        user_id: None,
        nickname: None,
        flags: None,
        created_at: None,
        last_seen: None,
        message: message.into(),
    }
}

pub fn get_user_info(ctx: &Context, req: GetUserInfo) -> HandlerResult<(MessageType, Bytes)> {
    let user = match (req.user_id, req.nickname.as_deref()) {
        (Some(id), _) => ctx.store.user_by_id(id),
        (None, Some(nickname)) => ctx.store.user_by_nickname(nickname),
        (None, None) => {
            return Err(HandlerError::new(
                ErrorCode::InvalidInput,
                "one of user_id or nickname is required",
            ))
        }
    };
    let resp = match user {
        Some(u) => UserInfo {
            success: true,
            user_id: Some(u.id),
            nickname: Some(u.nickname),
            flags: Some(u.flags),
            created_at: Some(u.created_at.timestamp()),
            last_seen: Some(u.last_seen.timestamp()),
            message: "ok".into(),
        },
        None => not_found("user not found"),
    };
    Ok((MessageType::USER_INFO, encode(|b| resp.encode(b))))
}

pub fn list_users(ctx: &Context, _req: ListUsers) -> HandlerResult<(MessageType, Bytes)> {
    let users = ctx
        .sessions
        .all_session_handles()
        .into_iter()
        .filter_map(|h| {
            let nickname = ctx.sessions.nickname(h.id)?;
            Some(UserSummary {
                user_id: ctx.sessions.user_id(h.id).unwrap_or(0),
                nickname,
                flags: ctx.sessions.flags(h.id),
            })
        })
        .collect();
    let resp = UserList { users };
    Ok((MessageType::USER_LIST, encode(|b| resp.encode(b))))
}

pub fn list_channel_users(ctx: &Context, req: ListChannelUsers) -> HandlerResult<(MessageType, Bytes)> {
    let users = ctx
        .sessions
        .sessions_in_channel(req.channel_id)
        .into_iter()
        .filter_map(|h| {
            let nickname = ctx.sessions.nickname(h.id)?;
            Some(UserSummary {
                user_id: ctx.sessions.user_id(h.id).unwrap_or(0),
                nickname,
                flags: ctx.sessions.flags(h.id),
            })
        })
        .collect();
    let resp = ChannelUserList {
        channel_id: req.channel_id,
        users,
    };
    Ok((MessageType::CHANNEL_USER_LIST, encode(|b| resp.encode(b))))
}
