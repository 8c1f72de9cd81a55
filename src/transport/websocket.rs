//! WebSocket transport (spec §6): frames travel as binary WS messages using
//! the identical wire format as TCP and SSH.
//!
//! `axum::extract::ws::WebSocket` isn't `AsyncRead`/`AsyncWrite`, so — like
//! the SSH transport — inbound bytes are bridged through
//! [`super::push_decoder::PushDecoder`] rather than a `Framed` codec.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::dispatch::context::Context;
use crate::protocol::codec::FrameCodec;
use crate::protocol::frame::PROTOCOL_V2;
use crate::session::SINK_BUFFER;
use crate::transport::gateway;
use crate::transport::push_decoder::PushDecoder;

pub async fn handle_socket(socket: WebSocket, ctx: Context, addr: SocketAddr) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (raw_tx, raw_rx) = mpsc::channel::<Bytes>(SINK_BUFFER);
    let (out_tx, mut out_rx) = mpsc::channel::<Bytes>(SINK_BUFFER);

    let reader = tokio::spawn(async move {
        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Binary(data)) => {
                    if raw_tx.send(Bytes::from(data)).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    let writer = tokio::spawn(async move {
        while let Some(bytes) = out_rx.recv().await {
            if ws_tx.send(Message::Binary(bytes.to_vec())).await.is_err() {
                break;
            }
        }
    });

    let decoder = PushDecoder::new(FrameCodec::new(), raw_rx);
    gateway::run(
        ctx,
        decoder,
        out_tx,
        Some(addr.to_string()),
        PROTOCOL_V2,
        None,
    )
    .await;

    reader.abort();
    writer.abort();
}
