//! Per-thread and per-channel subscription toggles.

use bytes::{Bytes, BytesMut};

use crate::dispatch::context::Context;
use crate::error::{ErrorCode, HandlerError, HandlerResult};
use crate::protocol::payloads::subscriptions::{SubscribeChannel, SubscribeOk, SubscribeThread};
use crate::protocol::MessageType;

fn encode(payload: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut buf = BytesMut::new();
    payload(&mut buf);
    buf.freeze()
}

fn ok(msg_type: MessageType, message: &str) -> (MessageType, Bytes) {
    let resp = SubscribeOk {
        success: true,
        message: message.into(),
    };
    (msg_type, encode(|b| resp.encode(b)))
}

fn failed(msg_type: MessageType, message: &str) -> (MessageType, Bytes) {
    let resp = SubscribeOk {
        success: false,
        message: message.into(),
    };
    (msg_type, encode(|b| resp.encode(b)))
}

pub fn subscribe_thread(
    ctx: &Context,
    session_id: u64,
    req: SubscribeThread,
) -> HandlerResult<(MessageType, Bytes)> {
    if ctx.store.message_by_id(req.thread_id).is_none() {
        return Ok(failed(MessageType::SUBSCRIBE_OK, "thread not found"));
    }
    match ctx.sessions.subscribe_thread(session_id, req.thread_id) {
        Ok(()) => Ok(ok(MessageType::SUBSCRIBE_OK, "ok")),
        Err(e) => Ok(failed(MessageType::SUBSCRIBE_OK, &e.to_string())),
    }
}

pub fn unsubscribe_thread(
    ctx: &Context,
    session_id: u64,
    req: SubscribeThread,
) -> HandlerResult<(MessageType, Bytes)> {
    ctx.sessions.unsubscribe_thread(session_id, req.thread_id)?;
    Ok(ok(MessageType::SUBSCRIBE_OK, "ok"))
}

pub fn subscribe_channel(
    ctx: &Context,
    session_id: u64,
    req: SubscribeChannel,
) -> HandlerResult<(MessageType, Bytes)> {
    let Some(channel) = ctx.store.channel_by_id(req.channel_id) else {
        return Ok(failed(MessageType::SUBSCRIBE_OK, "channel not found"));
    };
    if let Some(subchannel_id) = req.subchannel_id {
        let Some(sub) = ctx.store.channel_by_id(subchannel_id) else {
            return Ok(failed(MessageType::SUBSCRIBE_OK, "subchannel not found"));
        };
        if sub.parent_id != Some(channel.id) {
            return Err(HandlerError::new(
                ErrorCode::SubchannelNotFound,
                "subchannel does not belong to that channel",
            ));
        }
    }
    match ctx
        .sessions
        .subscribe_channel(session_id, (req.channel_id, req.subchannel_id))
    {
        Ok(()) => Ok(ok(MessageType::SUBSCRIBE_OK, "ok")),
        Err(e) => Ok(failed(MessageType::SUBSCRIBE_OK, &e.to_string())),
    }
}

pub fn unsubscribe_channel(
    ctx: &Context,
    session_id: u64,
    req: SubscribeChannel,
) -> HandlerResult<(MessageType, Bytes)> {
    ctx.sessions
        .unsubscribe_channel(session_id, (req.channel_id, req.subchannel_id))?;
    Ok(ok(MessageType::SUBSCRIBE_OK, "ok"))
}
