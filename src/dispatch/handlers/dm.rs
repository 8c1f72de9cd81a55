//! Thin wrapper around [`crate::dm`]'s free functions: decode the wire
//! request, call into the coordinator, then deliver each [`DmEffect`] to its
//! target session directly (these aren't broadcasts — every effect in a
//! batch typically carries a different payload for a different recipient).

use bytes::{Bytes, BytesMut};

use crate::dispatch::context::Context;
use crate::dm::{self, DmEffect};
use crate::error::{ErrorCode, HandlerError, HandlerResult};
use crate::protocol::frame::Frame;
use crate::protocol::payloads::dm::{AllowUnencrypted, DeclineDm, ProvidePublicKey, StartDm};
use crate::protocol::MessageType;

fn encode(payload: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut buf = BytesMut::new();
    payload(&mut buf);
    buf.freeze()
}

/// Delivers one frame directly to `to`, silently dropping it if that
/// session has since disconnected — the same "no retry" contract the
/// broadcast engine uses for dead peers.
async fn deliver(ctx: &Context, to: u64, msg_type: MessageType, payload: Bytes) {
    let Some(handle) = ctx.sessions.handle(to) else {
        return;
    };
    let frame = Frame::new(handle.protocol_version, msg_type, payload);
    let _ = handle.sink.send(frame.encode()).await;
}

async fn deliver_all(ctx: &Context, effects: Vec<DmEffect>) {
    for effect in effects {
        match effect {
            DmEffect::Ready { to, payload } => {
                deliver(ctx, to, MessageType::DM_READY, encode(|b| payload.encode(b))).await
            }
            DmEffect::Pending { to, payload } => {
                deliver(ctx, to, MessageType::DM_PENDING, encode(|b| payload.encode(b))).await
            }
            DmEffect::Request { to, payload } => {
                deliver(ctx, to, MessageType::DM_REQUEST, encode(|b| payload.encode(b))).await
            }
            DmEffect::KeyRequired { to, payload } => {
                deliver(ctx, to, MessageType::KEY_REQUIRED, encode(|b| payload.encode(b))).await
            }
            DmEffect::Declined { to, payload } => {
                deliver(ctx, to, MessageType::DM_DECLINED, encode(|b| payload.encode(b))).await
            }
            DmEffect::ParticipantLeft { to, payload } => {
                deliver(ctx, to, MessageType::DM_PARTICIPANT_LEFT, encode(|b| payload.encode(b))).await
            }
        }
    }
}

pub async fn start_dm(ctx: &Context, session_id: u64, req: StartDm) -> HandlerResult<()> {
    let effects = dm::start_dm(
        &ctx.store,
        &ctx.sessions,
        session_id,
        &req.target_nickname,
        req.allow_unencrypted,
    )?;
    deliver_all(ctx, effects).await;
    Ok(())
}

pub async fn allow_unencrypted(ctx: &Context, session_id: u64, req: AllowUnencrypted) -> HandlerResult<()> {
    let effects = dm::allow_unencrypted(&ctx.store, &ctx.sessions, session_id, req.channel_id)?;
    deliver_all(ctx, effects).await;
    Ok(())
}

pub async fn decline_dm(ctx: &Context, session_id: u64, req: DeclineDm) -> HandlerResult<()> {
    let effects = dm::decline_dm(&ctx.store, &ctx.sessions, session_id, req.channel_id)?;
    deliver_all(ctx, effects).await;
    Ok(())
}

pub async fn provide_public_key(ctx: &Context, session_id: u64, req: ProvidePublicKey) -> HandlerResult<()> {
    let key: [u8; 32] = req
        .public_key
        .try_into()
        .map_err(|_| HandlerError::new(ErrorCode::InvalidInput, "public key must be 32 bytes"))?;
    let effects = dm::provide_public_key(&ctx.store, &ctx.sessions, session_id, key)?;
    deliver_all(ctx, effects).await;
    Ok(())
}

/// Called from the connection loop on disconnect for every DM channel the
/// departing session participated in.
pub async fn participant_left(ctx: &Context, channel_id: u64, leaver_session_id: u64, leaver_nickname: &str) -> HandlerResult<()> {
    let effects = dm::participant_left(&ctx.store, &ctx.sessions, channel_id, leaver_session_id, leaver_nickname)?;
    deliver_all(ctx, effects).await;
    Ok(())
}
