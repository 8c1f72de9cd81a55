//! Fan-out broadcast engine.
//!
//! Generalizes the gateway's single-recipient push — `NodeRegistry::get_sink`
//! followed by one `sink.send(msg)` — to concurrent many-sink fan-out: encode
//! the broadcast once (both protocol versions, see [`crate::protocol::frame`]),
//! then hand chunks of recipients to a bounded pool of worker tasks.

use std::sync::Arc;

use crate::protocol::frame::{encode_broadcast, EncodedBroadcast};
use crate::protocol::MessageType;
use crate::session::SessionHandle;

/// At most this many workers run for a single broadcast, regardless of how
/// many peers are being fanned out to.
pub const MAX_WORKERS: usize = 40;
/// Each worker handles at most this many peers before the pool scales out
/// wider instead of piling more onto one worker.
pub const MAX_CHUNK_SIZE: usize = 50;

/// A predicate deciding whether `recipient` should receive a shadowbanned
/// author's message. Evaluated at broadcast time rather than stored as a
/// per-recipient flag, per the shadowban semantics: the author keeps
/// believing they're heard, but ordinary recipients silently don't see it.
pub trait ShadowbanFilter: Fn(&SessionHandle) -> bool + Send + Sync {}
impl<F: Fn(&SessionHandle) -> bool + Send + Sync> ShadowbanFilter for F {}

/// Number of worker tasks for `peer_count` recipients: `min(ceil(n/50), 40)`.
pub fn worker_count(peer_count: usize) -> usize {
    if peer_count == 0 {
        return 0;
    }
    peer_count.div_ceil(MAX_CHUNK_SIZE).min(MAX_WORKERS)
}

/// Sends `payload` (as message type `msg_type`) to every peer in `recipients`
/// for whom `allow` returns true, splitting the work across a bounded worker
/// pool. A peer whose sink is closed or full is reported back so the caller
/// (typically the session manager) can reap it — there is no retry.
///
/// `allow` is evaluated once per recipient, always (not just for
/// shadowbanned authors), so callers pass `|_| true` for ordinary broadcasts.
pub async fn broadcast<F>(
    msg_type: MessageType,
    payload: &[u8],
    recipients: Vec<SessionHandle>,
    allow: F,
) -> Vec<u64>
where
    F: Fn(&SessionHandle) -> bool + Send + Sync + 'static,
{
    if recipients.is_empty() {
        return Vec::new();
    }
    let encoded = Arc::new(encode_broadcast(msg_type, payload));
    let allow = Arc::new(allow);

    let workers = worker_count(recipients.len());
    let chunk_size = recipients.len().div_ceil(workers.max(1));

    let mut tasks = Vec::with_capacity(workers);
    for chunk in recipients.chunks(chunk_size.max(1)) {
        let chunk = chunk.to_vec();
        let encoded = Arc::clone(&encoded);
        let allow = Arc::clone(&allow);
        tasks.push(tokio::spawn(async move {
            send_chunk(&encoded, &chunk, allow.as_ref()).await
        }));
    }

    let mut dead = Vec::new();
    for task in tasks {
        match task.await {
            Ok(mut ids) => dead.append(&mut ids),
            Err(e) => tracing::error!(error = %e, "broadcast worker panicked"),
        }
    }
    dead
}

async fn send_chunk(
    encoded: &EncodedBroadcast,
    chunk: &[SessionHandle],
    allow: &(dyn Fn(&SessionHandle) -> bool + Send + Sync),
) -> Vec<u64> {
    let mut dead = Vec::new();
    for peer in chunk {
        if !allow(peer) {
            continue;
        }
        let frame = encoded.for_version(peer.protocol_version).clone();
        if peer.sink.try_send(frame).is_err() {
            dead.push(peer.id);
        }
    }
    dead
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_scales_and_caps() {
        assert_eq!(worker_count(0), 0);
        assert_eq!(worker_count(1), 1);
        assert_eq!(worker_count(50), 1);
        assert_eq!(worker_count(51), 2);
        assert_eq!(worker_count(2000), 40);
        assert_eq!(worker_count(100_000), 40);
    }

    #[tokio::test]
    async fn broadcast_delivers_to_all_and_reaps_closed_sinks() {
        let (tx_a, mut rx_a) = tokio::sync::mpsc::channel(8);
        let (tx_b, rx_b) = tokio::sync::mpsc::channel(8);
        drop(rx_b); // peer b's reader already gone: a dead peer.

        let handles = vec![
            SessionHandle { id: 1, protocol_version: 1, sink: tx_a },
            SessionHandle { id: 2, protocol_version: 1, sink: tx_b },
        ];

        let dead = broadcast(MessageType::NEW_MESSAGE, b"hello", handles, |_| true).await;

        assert_eq!(dead, vec![2]);
        assert!(rx_a.recv().await.is_some());
    }
}
