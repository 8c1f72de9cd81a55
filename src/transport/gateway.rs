//! Shared per-connection loop (spec §9, "multi-transport uniformity").
//!
//! Each transport (`tcp`, `ssh`, `websocket`) normalizes its connection down
//! to a frame stream plus a serialized-write sink, then hands both to
//! [`run`]. Everything past that point — the `SERVER_CONFIG` handshake,
//! dispatch, `ERROR` framing, and disconnect cleanup — is transport-blind.

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use rand::RngCore;

use crate::dispatch::context::Context;
use crate::dispatch::{dispatch, handlers::dm};
use crate::error::{ErrorCode, HandlerError};
use crate::protocol::codec::{DecodedFrame, FrameCodecError};
use crate::protocol::frame::{Frame, PROTOCOL_V2};
use crate::protocol::payloads::connection::ServerConfig;
use crate::protocol::payloads::error::ErrorResponse;
use crate::protocol::payloads::identity::AuthResponse;
use crate::protocol::MessageType;
use crate::session::SessionSink;
use crate::telemetry;

/// Identity a transport may have already established before the gateway
/// loop starts. SSH resolves this during key auth; TCP and WebSocket start
/// every connection anonymous.
#[derive(Debug, Clone)]
pub struct PreAuthenticated {
    pub user_id: u64,
    pub nickname: String,
    pub flags: u8,
    pub shadowbanned: bool,
}

fn encode(payload: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut buf = BytesMut::new();
    payload(&mut buf);
    buf.freeze()
}

fn random_db_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Runs one connection end to end: registers the session, sends
/// `SERVER_CONFIG`, optionally acks a pre-established identity, then loops
/// decoding and dispatching frames until disconnect, a read error, or a
/// write failure on this peer (which is unrecoverable — no retry).
pub async fn run<S>(
    ctx: Context,
    mut frames: S,
    tx: SessionSink,
    remote_addr: Option<String>,
    protocol_version: u8,
    pre_authenticated: Option<PreAuthenticated>,
) where
    S: Stream<Item = Result<DecodedFrame, FrameCodecError>> + Unpin,
{
    let session_id = ctx.sessions.create_session(
        random_db_session_id(),
        remote_addr,
        protocol_version,
        tx.clone(),
    );
    telemetry::SESSIONS_ACTIVE.inc();
    telemetry::CONNECTIONS_TOTAL.inc();

    let hello = ServerConfig {
        sid: session_id.to_string(),
        server_name: ctx.config.server.name.clone(),
        description: ctx.config.server.description.clone(),
        max_users: ctx.config.server.max_users,
        protocol_version: PROTOCOL_V2,
    };
    let hello_frame = Frame::new(protocol_version, MessageType::SERVER_CONFIG, encode(|b| hello.encode(b)));
    if tx.send(hello_frame.encode()).await.is_err() {
        cleanup(&ctx, session_id).await;
        return;
    }

    // SSH resolves identity during key exchange, before any client message —
    // send AUTH_RESPONSE immediately rather than waiting for AUTH_REQUEST.
    if let Some(pre) = pre_authenticated {
        if ctx
            .sessions
            .set_identity(session_id, Some(pre.user_id), pre.nickname.clone(), pre.flags)
            .is_ok()
        {
            if pre.shadowbanned {
                let _ = ctx.sessions.set_shadowbanned(session_id, true);
            }
            let resp = AuthResponse {
                success: true,
                user_id: Some(pre.user_id),
                flags: Some(pre.flags),
                message: "authenticated via SSH key".into(),
            };
            let frame = Frame::new(protocol_version, MessageType::AUTH_RESPONSE, encode(|b| resp.encode(b)));
            if tx.send(frame.encode()).await.is_err() {
                cleanup(&ctx, session_id).await;
                return;
            }
        }
    }

    loop {
        let decoded = match frames.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                tracing::debug!(session_id, error = %e, "frame decode error, closing connection");
                telemetry::ERRORS_SENT_TOTAL.inc();
                let code = match e {
                    FrameCodecError::Framing(_) | FrameCodecError::TooLarge(_) => ErrorCode::Framing,
                    FrameCodecError::Decompress(_) => ErrorCode::InvalidFormat,
                };
                let resp = ErrorResponse {
                    code: code.code(),
                    message: e.to_string(),
                };
                let frame = Frame::new(protocol_version, MessageType::ERROR, encode(|b| resp.encode(b)));
                let _ = tx.send(frame.encode()).await;
                break;
            }
            None => break,
        };

        match dispatch(&ctx, session_id, decoded).await {
            Ok(Some((msg_type, payload))) => {
                if msg_type == MessageType::MESSAGE_POSTED {
                    telemetry::MESSAGES_POSTED_TOTAL.inc();
                }
                let version = ctx
                    .sessions
                    .handle(session_id)
                    .map(|h| h.protocol_version)
                    .unwrap_or(protocol_version);
                let frame = Frame::new(version, msg_type, payload);
                if tx.send(frame.encode()).await.is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(HandlerError::Quit) => break,
            Err(err) => {
                if matches!(err, HandlerError::Internal(_)) {
                    tracing::error!(session_id, error = %err, "internal error handling frame");
                }
                telemetry::ERRORS_SENT_TOTAL.inc();
                let resp: ErrorResponse = (&err).into();
                let frame = Frame::new(protocol_version, MessageType::ERROR, encode(|b| resp.encode(b)));
                if tx.send(frame.encode()).await.is_err() {
                    break;
                }
            }
        }
    }

    cleanup(&ctx, session_id).await;
}

/// Removes the session, then notifies every DM channel it participated in —
/// the disconnect transition in the DM coordinator (spec §4.6, item 5).
async fn cleanup(ctx: &Context, session_id: u64) {
    let nickname = ctx.sessions.nickname(session_id).unwrap_or_default();
    let marker = Some(session_id.to_string());
    let dm_channels: Vec<u64> = ctx
        .store
        .list_channels_including_dm()
        .into_iter()
        .filter(|c| c.is_dm)
        .filter(|c| {
            ctx.store
                .dm_participants(c.id)
                .iter()
                .any(|p| p.session_id == marker)
        })
        .map(|c| c.id)
        .collect();

    ctx.sessions.remove_session(session_id);
    telemetry::SESSIONS_ACTIVE.dec();

    for channel_id in dm_channels {
        if let Err(e) = dm::participant_left(ctx, channel_id, session_id, &nickname).await {
            tracing::debug!(session_id, channel_id, error = %e, "failed to notify DM participants on disconnect");
        }
    }
}
