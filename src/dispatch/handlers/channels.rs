//! Channel directory: list, join, leave, create, create subchannel, delete.

use bytes::{Bytes, BytesMut};

use crate::dispatch::context::Context;
use crate::error::{ErrorCode, HandlerError, HandlerResult};
use crate::protocol::payloads::channels::{
    ChannelCreated, ChannelDeleted, ChannelInfo, ChannelList, CreateChannel, CreateSubchannel,
    DeleteChannel, JoinChannel, JoinResponse, LeaveChannel, LeaveResponse, ListChannels,
};
use crate::protocol::payloads::presence::ChannelPresence;
use crate::protocol::MessageType;
use crate::store::channel::{CHANNEL_TYPE_CHAT, CHANNEL_TYPE_FORUM};
use crate::store::Channel;

const PRESENCE_JOIN: u8 = 0;
const PRESENCE_LEAVE: u8 = 1;

fn encode(payload: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut buf = BytesMut::new();
    payload(&mut buf);
    buf.freeze()
}

fn info(c: &Channel) -> ChannelInfo {
    ChannelInfo {
        id: c.id,
        name: c.name.clone(),
        display_name: c.display_name.clone(),
        description: c.description.clone(),
        channel_type: c.channel_type,
        retention_hours: c.retention_hours,
        is_private: c.is_private,
        is_dm: c.is_dm,
        parent_id: c.parent_id,
        created_at: c.created_at.timestamp(),
    }
}

pub fn list_channels(ctx: &Context, _req: ListChannels) -> HandlerResult<(MessageType, Bytes)> {
    let channels = ctx
        .store
        .list_channels()
        .iter()
        .filter(|c| !c.is_private)
        .map(info)
        .collect();
    let resp = ChannelList { channels };
    Ok((MessageType::CHANNEL_LIST, encode(|b| resp.encode(b))))
}

pub async fn join_channel(
    ctx: &Context,
    session_id: u64,
    req: JoinChannel,
) -> HandlerResult<(MessageType, Bytes)> {
    let Some(channel) = ctx.store.channel_by_id(req.channel_id) else {
        let resp = JoinResponse {
            success: false,
            channel_id: None,
            message: "channel not found".into(),
        };
        return Ok((MessageType::JOIN_RESPONSE, encode(|b| resp.encode(b))));
    };
    let nickname = ctx
        .sessions
        .nickname(session_id)
        .ok_or_else(|| HandlerError::new(ErrorCode::NicknameRequired, "set a nickname first"))?;

    let previous = ctx.sessions.set_joined_channel(session_id, Some(channel.id))?;
    if let Some(prev) = previous {
        if prev != channel.id {
            let leave = ChannelPresence {
                channel_id: prev,
                nickname: nickname.clone(),
                event: PRESENCE_LEAVE,
            };
            let payload = encode(|b| leave.encode(b));
            let recipients = ctx.sessions.sessions_in_channel(prev);
            crate::broadcast::broadcast(MessageType::CHANNEL_PRESENCE, &payload, recipients, move |h| {
                h.id != session_id
            })
            .await;
        }
    }

    let presence = ChannelPresence {
        channel_id: channel.id,
        nickname,
        event: PRESENCE_JOIN,
    };
    let payload = encode(|b| presence.encode(b));
    let recipients = ctx.sessions.sessions_in_channel(channel.id);
    crate::broadcast::broadcast(MessageType::CHANNEL_PRESENCE, &payload, recipients, move |h| {
        h.id != session_id
    })
    .await;

    let resp = JoinResponse {
        success: true,
        channel_id: Some(channel.id),
        message: "ok".into(),
    };
    Ok((MessageType::JOIN_RESPONSE, encode(|b| resp.encode(b))))
}

pub async fn leave_channel(
    ctx: &Context,
    session_id: u64,
    req: LeaveChannel,
) -> HandlerResult<(MessageType, Bytes)> {
    let nickname = ctx.sessions.nickname(session_id).unwrap_or_default();
    let previous = ctx.sessions.set_joined_channel(session_id, None)?;
    if previous != Some(req.channel_id) {
        let resp = LeaveResponse {
            success: false,
            message: "not in that channel".into(),
        };
        return Ok((MessageType::LEAVE_RESPONSE, encode(|b| resp.encode(b))));
    }

    let presence = ChannelPresence {
        channel_id: req.channel_id,
        nickname,
        event: PRESENCE_LEAVE,
    };
    let payload = encode(|b| presence.encode(b));
    let recipients = ctx.sessions.sessions_in_channel(req.channel_id);
    crate::broadcast::broadcast(MessageType::CHANNEL_PRESENCE, &payload, recipients, |_| true)
        .await;

    let resp = LeaveResponse {
        success: true,
        message: "ok".into(),
    };
    Ok((MessageType::LEAVE_RESPONSE, encode(|b| resp.encode(b))))
}

/// Name/display-name bounds are fixed by the channel-creation contract
/// itself rather than the ambient `limits` config (which governs the
/// generic name-length cap used elsewhere, e.g. nicknames).
const MIN_CHANNEL_NAME_LEN: usize = 3;
const MAX_CHANNEL_NAME_LEN: usize = 50;
const MAX_DISPLAY_NAME_LEN: usize = 100;

fn validate_new_channel(
    ctx: &Context,
    name: &str,
    display_name: &str,
    channel_type: u8,
    retention_hours: u32,
) -> Result<(), (String,)> {
    let name_len = name.chars().count();
    if !(MIN_CHANNEL_NAME_LEN..=MAX_CHANNEL_NAME_LEN).contains(&name_len) {
        return Err(("name must be 3-50 characters".into(),));
    }
    let display_len = display_name.chars().count();
    if display_len == 0 || display_len > MAX_DISPLAY_NAME_LEN {
        return Err(("display name must be 1-100 characters".into(),));
    }
    if channel_type != CHANNEL_TYPE_CHAT && channel_type != CHANNEL_TYPE_FORUM {
        return Err(("channel type must be 0 (chat) or 1 (forum)".into(),));
    }
    if retention_hours < ctx.config.limits.min_retention_hours
        || retention_hours > ctx.config.limits.max_retention_hours
    {
        return Err(("retention hours out of range".into(),));
    }
    Ok(())
}

pub fn create_channel(
    ctx: &Context,
    session_id: u64,
    req: CreateChannel,
) -> HandlerResult<(MessageType, Bytes)> {
    if ctx.sessions.user_id(session_id).is_none() {
        return Err(HandlerError::new(
            ErrorCode::AuthRequired,
            "must be a registered user to create a channel",
        ));
    }
    if let Err((message,)) =
        validate_new_channel(ctx, &req.name, &req.display_name, req.channel_type, req.retention_hours)
    {
        let resp = ChannelCreated {
            success: false,
            channel_id: None,
            message,
        };
        return Ok((MessageType::CHANNEL_CREATED, encode(|b| resp.encode(b))));
    }
    let channel_type = if req.channel_type == CHANNEL_TYPE_FORUM {
        CHANNEL_TYPE_FORUM
    } else {
        CHANNEL_TYPE_CHAT
    };
    let channel = ctx.store.create_channel(Channel {
        id: 0,
        name: req.name,
        display_name: req.display_name,
        description: req.description,
        channel_type,
        retention_hours: req.retention_hours,
        created_by: ctx.sessions.user_id(session_id),
        created_at: chrono::Utc::now(),
        is_private: req.is_private,
        is_dm: false,
        parent_id: None,
    })?;
    let resp = ChannelCreated {
        success: true,
        channel_id: Some(channel.id),
        message: "created".into(),
    };
    Ok((MessageType::CHANNEL_CREATED, encode(|b| resp.encode(b))))
}

pub fn create_subchannel(
    ctx: &Context,
    session_id: u64,
    req: CreateSubchannel,
) -> HandlerResult<(MessageType, Bytes)> {
    if ctx.sessions.user_id(session_id).is_none() {
        return Err(HandlerError::new(
            ErrorCode::AuthRequired,
            "must be a registered user to create a subchannel",
        ));
    }
    let Some(parent) = ctx.store.channel_by_id(req.parent_id) else {
        let resp = ChannelCreated {
            success: false,
            channel_id: None,
            message: "parent channel not found".into(),
        };
        return Ok((MessageType::CHANNEL_CREATED, encode(|b| resp.encode(b))));
    };
    if parent.is_subchannel() {
        return Err(HandlerError::new(
            ErrorCode::InvalidInput,
            "subchannels cannot themselves have subchannels",
        ));
    }
    if let Err((message,)) =
        validate_new_channel(ctx, &req.name, &req.display_name, req.channel_type, req.retention_hours)
    {
        let resp = ChannelCreated {
            success: false,
            channel_id: None,
            message,
        };
        return Ok((MessageType::CHANNEL_CREATED, encode(|b| resp.encode(b))));
    }
    let channel = ctx.store.create_channel(Channel {
        id: 0,
        name: req.name,
        display_name: req.display_name,
        description: req.description,
        channel_type: parent.channel_type,
        retention_hours: req.retention_hours,
        created_by: ctx.sessions.user_id(session_id),
        created_at: chrono::Utc::now(),
        is_private: req.is_private,
        is_dm: false,
        parent_id: Some(parent.id),
    })?;
    let resp = ChannelCreated {
        success: true,
        channel_id: Some(channel.id),
        message: "created".into(),
    };
    Ok((MessageType::CHANNEL_CREATED, encode(|b| resp.encode(b))))
}

pub fn delete_channel(
    ctx: &Context,
    session_id: u64,
    req: DeleteChannel,
) -> HandlerResult<(MessageType, Bytes)> {
    if ctx.sessions.flags(session_id) & crate::store::user::FLAG_ADMIN == 0 {
        return Err(HandlerError::new(
            ErrorCode::AdminRequired,
            "only admins can delete channels",
        ));
    }
    match ctx.store.delete_channel(req.channel_id) {
        Ok(deleted) => {
            ctx.sessions.purge_channel_subscriptions(
                deleted.channel_id,
                &deleted.subchannel_ids,
                &deleted.message_ids,
            );
            let resp = ChannelDeleted {
                success: true,
                channel_id: req.channel_id,
                message: "deleted".into(),
            };
            Ok((MessageType::CHANNEL_DELETED, encode(|b| resp.encode(b))))
        }
        Err(e) => {
            let resp = ChannelDeleted {
                success: false,
                channel_id: req.channel_id,
                message: e.to_string(),
            };
            Ok((MessageType::CHANNEL_DELETED, encode(|b| resp.encode(b))))
        }
    }
}
