//! Nickname, registration, auth, logout, and password-change handlers.
//!
//! `password_hash` fields arrive already hashed client-side (argon2id per
//! the wire doc comment); the server only ever compares hashes it already
//! holds, using a constant-time equality check rather than re-hashing.

use bytes::{Bytes, BytesMut};
use subtle::ConstantTimeEq;

use crate::dispatch::context::Context;
use crate::error::{ErrorCode, HandlerError, HandlerResult};
use crate::protocol::payloads::identity::{
    AuthRequest, AuthResponse, ChangePassword, Logout, NicknameResponse, PasswordChanged,
    RegisterResponse, RegisterUser, SetNickname,
};
use crate::protocol::payloads::presence::ServerPresence;
use crate::protocol::MessageType;
use crate::session::SessionManager;
use crate::store::user::is_valid_nickname;
use crate::store::Store;

const PRESENCE_JOIN: u8 = 0;

fn hashes_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn encode(payload: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut buf = BytesMut::new();
    payload(&mut buf);
    buf.freeze()
}

/// Finds a live session (other than `exclude`) already using `nickname`.
fn nickname_in_use(sessions: &SessionManager, nickname: &str, exclude: u64) -> bool {
    sessions
        .all_session_handles()
        .iter()
        .any(|h| h.id != exclude && sessions.nickname(h.id).as_deref() == Some(nickname))
}

pub async fn set_nickname(
    ctx: &Context,
    session_id: u64,
    req: SetNickname,
) -> HandlerResult<(MessageType, Bytes)> {
    if !is_valid_nickname(&req.nickname) {
        let resp = NicknameResponse {
            success: false,
            nickname: req.nickname,
            message: "nickname must be 3-20 chars of [A-Za-z0-9_-]".into(),
        };
        return Ok((MessageType::NICKNAME_RESPONSE, encode(|b| resp.encode(b))));
    }
    if ctx.store.user_by_nickname(&req.nickname).is_some()
        || nickname_in_use(&ctx.sessions, &req.nickname, session_id)
    {
        let resp = NicknameResponse {
            success: false,
            nickname: req.nickname,
            message: "nickname already in use".into(),
        };
        return Ok((MessageType::NICKNAME_RESPONSE, encode(|b| resp.encode(b))));
    }

    let flags = ctx.sessions.flags(session_id);
    ctx.sessions
        .set_identity(session_id, None, req.nickname.clone(), flags)?;

    let presence = ServerPresence {
        nickname: req.nickname.clone(),
        event: PRESENCE_JOIN,
    };
    let payload = encode(|b| presence.encode(b));
    let recipients = ctx.sessions.all_session_handles();
    crate::broadcast::broadcast(MessageType::SERVER_PRESENCE, &payload, recipients, move |h| {
        h.id != session_id
    })
    .await;

    let resp = NicknameResponse {
        success: true,
        nickname: req.nickname,
        message: "ok".into(),
    };
    Ok((MessageType::NICKNAME_RESPONSE, encode(|b| resp.encode(b))))
}

pub async fn register_user(
    ctx: &Context,
    session_id: u64,
    req: RegisterUser,
) -> HandlerResult<(MessageType, Bytes)> {
    let nickname = ctx
        .sessions
        .nickname(session_id)
        .ok_or_else(|| HandlerError::new(ErrorCode::NicknameRequired, "set a nickname first"))?;
    if nickname != req.nickname {
        return Err(HandlerError::new(
            ErrorCode::InvalidInput,
            "registration nickname must match the session's current nickname",
        ));
    }
    if let Some(ban) = ctx.store.get_active_ban_for_user(None, Some(&req.nickname)) {
        if !ban.shadowban {
            return Err(HandlerError::new(ErrorCode::Banned, ban.reason));
        }
    }
    let user = ctx
        .store
        .create_user(req.nickname, req.password_hash.unwrap_or_default(), 0)?;
    let admin_flags = if ctx.is_admin_nickname(&user.nickname) {
        crate::store::user::FLAG_ADMIN
    } else {
        0
    };
    ctx.sessions
        .set_identity(session_id, Some(user.id), user.nickname.clone(), admin_flags)?;
    let resp = RegisterResponse {
        success: true,
        user_id: Some(user.id),
        message: "registered".into(),
    };
    Ok((MessageType::REGISTER_RESPONSE, encode(|b| resp.encode(b))))
}

pub async fn auth_request(
    store: &Store,
    sessions: &SessionManager,
    session_id: u64,
    req: AuthRequest,
) -> HandlerResult<(MessageType, Bytes)> {
    let Some(user) = store.user_by_nickname(&req.nickname) else {
        let resp = AuthResponse {
            success: false,
            user_id: None,
            flags: None,
            message: "invalid credentials".into(),
        };
        return Ok((MessageType::AUTH_RESPONSE, encode(|b| resp.encode(b))));
    };
    if user.password_hash.is_empty() || !hashes_match(&user.password_hash, &req.password_hash) {
        let resp = AuthResponse {
            success: false,
            user_id: None,
            flags: None,
            message: "invalid credentials".into(),
        };
        return Ok((MessageType::AUTH_RESPONSE, encode(|b| resp.encode(b))));
    }
    if let Some(ban) = store.get_active_ban_for_user(Some(user.id), None) {
        if !ban.shadowban {
            return Err(HandlerError::new(ErrorCode::Banned, ban.reason));
        }
    }
    store.touch_user_last_seen(user.id);
    sessions.set_identity(session_id, Some(user.id), user.nickname.clone(), user.flags)?;
    if let Some(ban) = store.get_active_ban_for_user(Some(user.id), None) {
        if ban.shadowban {
            sessions.set_shadowbanned(session_id, true)?;
        }
    }
    let resp = AuthResponse {
        success: true,
        user_id: Some(user.id),
        flags: Some(user.flags),
        message: "ok".into(),
    };
    Ok((MessageType::AUTH_RESPONSE, encode(|b| resp.encode(b))))
}

pub fn logout(sessions: &SessionManager, session_id: u64, _req: Logout) -> HandlerResult<()> {
    sessions.remove_session(session_id);
    Err(HandlerError::Quit)
}

pub async fn change_password(
    store: &Store,
    sessions: &SessionManager,
    session_id: u64,
    req: ChangePassword,
) -> HandlerResult<(MessageType, Bytes)> {
    let user_id = sessions
        .user_id(session_id)
        .ok_or_else(|| HandlerError::new(ErrorCode::AuthRequired, "must be registered"))?;
    let user = store
        .user_by_id(user_id)
        .ok_or_else(|| HandlerError::new(ErrorCode::UserNotFound, "user not found"))?;
    if !user.password_hash.is_empty() {
        let matches = req
            .old_password_hash
            .as_deref()
            .is_some_and(|old| hashes_match(&user.password_hash, old));
        if !matches {
            let resp = PasswordChanged {
                success: false,
                message: "invalid credentials".into(),
            };
            return Ok((MessageType::PASSWORD_CHANGED, encode(|b| resp.encode(b))));
        }
    }
    store.set_user_password_hash(user_id, req.new_password_hash)?;
    let resp = PasswordChanged {
        success: true,
        message: "ok".into(),
    };
    Ok((MessageType::PASSWORD_CHANGED, encode(|b| resp.encode(b))))
}
