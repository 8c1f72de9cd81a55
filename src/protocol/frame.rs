//! Frame header and version-aware encoding (spec §4.1).
//!
//! A frame is `u32 length | u8 version | u8 type | u8 flags | payload`.
//! `length` covers everything after itself. For broadcasts we pre-encode
//! both a v1 (uncompressed) and a v2 (DEFLATE, only kept if strictly
//! shorter) payload once, then pick per peer by negotiated version — this
//! is the one optimization in this codebase that must never be lost.

use std::io::Write;

use bytes::{Bytes, BytesMut};
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::protocol::types::MessageType;

pub const HEADER_LEN: usize = 4 + 1 + 1 + 1;

/// Flag bit set on frames whose payload is DEFLATE-compressed.
pub const FLAG_COMPRESSED: u8 = 0x01;

pub const PROTOCOL_V1: u8 = 1;
pub const PROTOCOL_V2: u8 = 2;

#[derive(Debug, Clone)]
pub struct Frame {
    pub version: u8,
    pub msg_type: MessageType,
    pub flags: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(version: u8, msg_type: MessageType, payload: Bytes) -> Self {
        Self {
            version,
            msg_type,
            flags: 0,
            payload,
        }
    }

    /// Encode this frame (header + payload, as-is — no compression).
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        let body_len = 1 + 1 + 1 + self.payload.len();
        buf.extend_from_slice(&(body_len as u32).to_be_bytes());
        buf.extend_from_slice(&[self.version, self.msg_type.0, self.flags]);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }
}

/// The two pre-encoded forms of a single outgoing broadcast. Produced once
/// per broadcast; the engine picks which bytes to write per peer based on
/// that peer's negotiated protocol version.
pub struct EncodedBroadcast {
    pub v1: Bytes,
    pub v2: Option<Bytes>,
}

impl EncodedBroadcast {
    /// Select the bytes to send to a peer at the given negotiated version.
    pub fn for_version(&self, peer_version: u8) -> &Bytes {
        if peer_version >= PROTOCOL_V2 {
            self.v2.as_ref().unwrap_or(&self.v1)
        } else {
            &self.v1
        }
    }
}

/// Produce both the v1 and (if strictly smaller) v2 encodings of a frame.
pub fn encode_broadcast(msg_type: MessageType, payload: &[u8]) -> EncodedBroadcast {
    let v1_frame = Frame::new(PROTOCOL_V1, msg_type, Bytes::copy_from_slice(payload));
    let v1 = v1_frame.encode();

    let compressed = deflate(payload);
    let v2 = if compressed.len() < payload.len() {
        let mut frame = Frame::new(PROTOCOL_V2, msg_type, Bytes::from(compressed));
        frame.flags |= FLAG_COMPRESSED;
        Some(frame.encode())
    } else {
        None
    };

    EncodedBroadcast { v1, v2 }
}

fn deflate(payload: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    // Writing to an in-memory Vec via DeflateEncoder cannot fail.
    encoder.write_all(payload).expect("in-memory deflate write");
    encoder.finish().expect("in-memory deflate finish")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_produces_correct_length_prefix() {
        let frame = Frame::new(PROTOCOL_V1, MessageType::PING, Bytes::new());
        let encoded = frame.encode();
        let len = u32::from_be_bytes(encoded[..4].try_into().unwrap());
        assert_eq!(len as usize, encoded.len() - 4);
        assert_eq!(len, 3);
    }

    #[test]
    fn v2_discarded_when_not_strictly_shorter() {
        // Tiny/incompressible payloads often don't shrink under DEFLATE
        // once its own framing overhead is counted.
        let payload = [0xFFu8];
        let encoded = encode_broadcast(MessageType::PING, &payload);
        if let Some(v2) = &encoded.v2 {
            assert!(v2.len() < encoded.v1.len());
        }
    }

    #[test]
    fn v2_kept_when_strictly_shorter() {
        let payload = vec![b'a'; 4096];
        let encoded = encode_broadcast(MessageType::NEW_MESSAGE, &payload);
        let v2 = encoded.v2.expect("highly repetitive payload should compress");
        assert!(v2.len() < encoded.v1.len());
    }

    #[test]
    fn for_version_selects_v1_for_legacy_peers() {
        let payload = vec![b'a'; 4096];
        let encoded = encode_broadcast(MessageType::NEW_MESSAGE, &payload);
        assert_eq!(encoded.for_version(1), &encoded.v1);
    }

    #[test]
    fn for_version_selects_v2_when_available() {
        let payload = vec![b'a'; 4096];
        let encoded = encode_broadcast(MessageType::NEW_MESSAGE, &payload);
        let picked = encoded.for_version(2);
        assert_eq!(picked, encoded.v2.as_ref().unwrap());
    }
}
