//! Plain TCP transport: one accept loop, one connection task per peer.

use tokio::net::TcpListener;
use tokio_util::codec::Framed;

use crate::dispatch::context::Context;
use crate::protocol::codec::FrameCodec;
use crate::protocol::frame::PROTOCOL_V2;
use crate::session::SINK_BUFFER;
use crate::transport::gateway;

pub async fn listen(ctx: Context, bind_addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "TCP transport listening");

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept failed");
                continue;
            }
        };
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let framed = Framed::new(stream, FrameCodec::new());
            let (sink, stream) = futures_util::StreamExt::split(framed);
            let (tx, rx) = tokio::sync::mpsc::channel(SINK_BUFFER);
            tokio::spawn(write_loop(sink, rx));
            gateway::run(ctx, stream, tx, Some(peer_addr.to_string()), PROTOCOL_V2, None).await;
        });
    }
}

/// Drains pre-encoded frame bytes onto the socket, serializing every write
/// (direct responses and broadcast fan-out alike) through this one task.
async fn write_loop(
    mut sink: futures_util::stream::SplitSink<
        Framed<tokio::net::TcpStream, FrameCodec>,
        bytes::Bytes,
    >,
    mut rx: tokio::sync::mpsc::Receiver<bytes::Bytes>,
) {
    use futures_util::SinkExt;
    while let Some(bytes) = rx.recv().await {
        if sink.send(bytes).await.is_err() {
            break;
        }
    }
}
