//! Posting, listing, editing, and deleting channel/thread messages.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};

use crate::dispatch::context::Context;
use crate::error::{ErrorCode, HandlerError, HandlerResult};
use crate::protocol::payloads::messages::{
    DeleteMessage, EditMessage, ListMessages, MessageDeleteResponse, MessageDeleted,
    MessageEditResponse, MessageEdited, MessageInfo, MessageList, MessagePosted, NewMessage,
    PostMessage,
};
use crate::protocol::MessageType;
use crate::session::SessionHandle;
use crate::store::user::FLAG_ADMIN;
use crate::store::Message;

fn encode(payload: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut buf = BytesMut::new();
    payload(&mut buf);
    buf.freeze()
}

fn info(m: &Message) -> MessageInfo {
    MessageInfo {
        id: m.id,
        channel_id: m.channel_id,
        subchannel_id: m.subchannel_id,
        parent_id: m.parent_id,
        thread_root_id: m.thread_root_id,
        author_user_id: m.author_user_id,
        author_nickname: m.author_nickname.clone(),
        content: m.content.clone(),
        created_at: m.created_at.timestamp(),
        edited_at: m.edited_at.map(|t| t.timestamp()),
        deleted_at: m.deleted_at.map(|t| t.timestamp()),
    }
}

/// Target selection for a freshly posted message: root messages go to the
/// channel/subchannel subscriber index, replies go to the thread subscriber
/// index keyed by `thread_root_id`.
fn new_message_targets(ctx: &Context, message: &Message) -> Vec<SessionHandle> {
    match message.thread_root_id {
        Some(root) => ctx.sessions.thread_subscriber_handles(root),
        None => ctx
            .sessions
            .channel_subscriber_handles((message.channel_id, message.subchannel_id)),
    }
}

/// Target selection for edits/deletes: the union of channel subscribers and
/// sessions currently joined to that channel, deduplicated by session id.
fn mutation_targets(ctx: &Context, channel_id: u64, subchannel_id: Option<u64>) -> Vec<SessionHandle> {
    let mut by_id: HashMap<u64, SessionHandle> = HashMap::new();
    for h in ctx.sessions.channel_subscriber_handles((channel_id, subchannel_id)) {
        by_id.insert(h.id, h);
    }
    for h in ctx.sessions.sessions_in_channel(subchannel_id.unwrap_or(channel_id)) {
        by_id.insert(h.id, h);
    }
    by_id.into_values().collect()
}

pub async fn post_message(
    ctx: &Context,
    session_id: u64,
    req: PostMessage,
) -> HandlerResult<(MessageType, Bytes)> {
    if req.content.chars().count() > ctx.config.limits.max_message_length {
        return Err(HandlerError::new(ErrorCode::MessageTooLong, "message too long"));
    }
    let Some(channel) = ctx.store.channel_by_id(req.channel_id) else {
        let resp = MessagePosted {
            success: false,
            message_id: None,
            thread_root_id: None,
            message: "channel not found".into(),
        };
        return Ok((MessageType::MESSAGE_POSTED, encode(|b| resp.encode(b))));
    };
    if !channel.is_forum() && req.parent_id.is_some() {
        return Err(HandlerError::new(
            ErrorCode::InvalidInput,
            "chat channels do not support threaded replies",
        ));
    }
    if let Some(parent_id) = req.parent_id {
        match ctx.store.message_by_id(parent_id) {
            Some(parent) if parent.channel_id == channel.id => {}
            _ => {
                return Err(HandlerError::new(
                    ErrorCode::InvalidInput,
                    "parent_id must reference an existing message in the same channel",
                ));
            }
        }
    }
    if channel.is_dm {
        let user_id = ctx.sessions.user_id(session_id);
        let session_id_str = session_id.to_string();
        let is_participant = ctx.store.dm_participants(channel.id).iter().any(|p| {
            (user_id.is_some() && p.user_id == user_id) || p.session_id.as_deref() == Some(session_id_str.as_str())
        });
        if !is_participant {
            return Err(HandlerError::new(
                ErrorCode::NotParticipant,
                "not a participant in this direct message",
            ));
        }
    }
    let nickname = ctx
        .sessions
        .nickname(session_id)
        .ok_or_else(|| HandlerError::new(ErrorCode::NicknameRequired, "set a nickname first"))?;

    let message = ctx.store.post_message(Message {
        id: 0,
        channel_id: channel.id,
        subchannel_id: req.subchannel_id,
        parent_id: req.parent_id,
        thread_root_id: None,
        author_user_id: ctx.sessions.user_id(session_id),
        author_nickname: nickname,
        content: req.content,
        created_at: chrono::Utc::now(),
        edited_at: None,
        deleted_at: None,
    });

    let broadcast_payload = NewMessage { message: info(&message) };
    let payload = encode(|b| broadcast_payload.encode(b));
    let targets = new_message_targets(ctx, &message);
    if ctx.sessions.is_shadowbanned(session_id) {
        let sessions = ctx.sessions.clone();
        crate::broadcast::broadcast(MessageType::NEW_MESSAGE, &payload, targets, move |h| {
            h.id == session_id || sessions.flags(h.id) & FLAG_ADMIN != 0
        })
        .await;
    } else {
        crate::broadcast::broadcast(MessageType::NEW_MESSAGE, &payload, targets, |_| true).await;
    }

    let resp = MessagePosted {
        success: true,
        message_id: Some(message.id),
        thread_root_id: message.thread_root_id,
        message: "posted".into(),
    };
    Ok((MessageType::MESSAGE_POSTED, encode(|b| resp.encode(b))))
}

pub fn list_messages(ctx: &Context, req: ListMessages) -> HandlerResult<(MessageType, Bytes)> {
    if req.before_id.is_some() && req.after_id.is_some() {
        return Err(HandlerError::new(
            ErrorCode::InvalidInput,
            "before_id and after_id are mutually exclusive",
        ));
    }
    let messages = ctx
        .store
        .list_messages(
            req.channel_id,
            req.subchannel_id,
            req.parent_id,
            req.limit,
            req.before_id,
            req.after_id,
        )
        .iter()
        .map(info)
        .collect();
    let resp = MessageList { messages };
    Ok((MessageType::MESSAGE_LIST, encode(|b| resp.encode(b))))
}

fn authorize_message_owner(ctx: &Context, session_id: u64, message: &Message) -> HandlerResult<()> {
    let is_author = ctx.sessions.user_id(session_id).is_some() && ctx.sessions.user_id(session_id) == message.author_user_id;
    let is_admin = ctx.sessions.flags(session_id) & FLAG_ADMIN != 0;
    if is_author || is_admin {
        Ok(())
    } else {
        Err(HandlerError::new(ErrorCode::NotOwner, "not the message author"))
    }
}

pub async fn edit_message(
    ctx: &Context,
    session_id: u64,
    req: EditMessage,
) -> HandlerResult<(MessageType, Bytes)> {
    if req.content.chars().count() > ctx.config.limits.max_message_length {
        return Err(HandlerError::new(ErrorCode::MessageTooLong, "message too long"));
    }
    let Some(existing) = ctx.store.message_by_id(req.message_id) else {
        let resp = MessageEditResponse {
            success: false,
            message: "message not found".into(),
        };
        return Ok((MessageType::MESSAGE_EDIT_RESPONSE, encode(|b| resp.encode(b))));
    };
    if existing.is_deleted() || existing.is_anonymous() {
        return Err(HandlerError::new(
            ErrorCode::InvalidInput,
            "cannot edit a deleted or anonymous message",
        ));
    }
    authorize_message_owner(ctx, session_id, &existing)?;
    let updated = ctx.store.edit_message(req.message_id, req.content.clone())?;

    let event = MessageEdited {
        message_id: updated.id,
        content: req.content,
        edited_at: updated.edited_at.map(|t| t.timestamp()).unwrap_or_default(),
    };
    let payload = encode(|b| event.encode(b));
    let targets = mutation_targets(ctx, updated.channel_id, updated.subchannel_id);
    crate::broadcast::broadcast(MessageType::MESSAGE_EDITED, &payload, targets, |_| true).await;

    let resp = MessageEditResponse {
        success: true,
        message: "edited".into(),
    };
    Ok((MessageType::MESSAGE_EDIT_RESPONSE, encode(|b| resp.encode(b))))
}

pub async fn delete_message(
    ctx: &Context,
    session_id: u64,
    req: DeleteMessage,
) -> HandlerResult<(MessageType, Bytes)> {
    let Some(existing) = ctx.store.message_by_id(req.message_id) else {
        let resp = MessageDeleteResponse {
            success: false,
            message: "message not found".into(),
        };
        return Ok((MessageType::MESSAGE_DELETE_RESPONSE, encode(|b| resp.encode(b))));
    };
    authorize_message_owner(ctx, session_id, &existing)?;
    let deleted = ctx.store.delete_message(req.message_id)?;

    let event = MessageDeleted {
        message_id: deleted.id,
        deleted_at: deleted.deleted_at.map(|t| t.timestamp()).unwrap_or_default(),
    };
    let payload = encode(|b| event.encode(b));
    let targets = mutation_targets(ctx, deleted.channel_id, deleted.subchannel_id);
    crate::broadcast::broadcast(MessageType::MESSAGE_DELETED, &payload, targets, |_| true).await;

    let resp = MessageDeleteResponse {
        success: true,
        message: "deleted".into(),
    };
    Ok((MessageType::MESSAGE_DELETE_RESPONSE, encode(|b| resp.encode(b))))
}
