//! `tokio_util::codec` adapter for the wire frame format.

use std::io::{self, Read};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::read::DeflateDecoder;
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::frame::{Frame, FLAG_COMPRESSED, HEADER_LEN};
use crate::protocol::types::MessageType;

/// Cap on a single frame's total size, guarding against a malicious or
/// buggy peer claiming an unbounded length prefix.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameCodecError {
    /// A malformed or out-of-bounds header: oversized length prefix, or a
    /// body that is too short to even hold `version | type | flags`.
    #[error("malformed frame: {0}")]
    Framing(String),
    #[error("frame exceeds maximum length ({0} > {MAX_FRAME_LEN})")]
    TooLarge(u32),
    #[error("decompression failed: {0}")]
    Decompress(#[from] io::Error),
}

/// Decoded frame with its payload already decompressed if `FLAG_COMPRESSED`
/// was set.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub version: u8,
    pub msg_type: MessageType,
    pub flags: u8,
    pub payload: Bytes,
}

#[derive(Debug, Default)]
pub struct FrameCodec {
    next_len: Option<u32>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = DecodedFrame;
    type Error = FrameCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let body_len = match self.next_len {
            Some(len) => len,
            None => {
                if src.len() < 4 {
                    return Ok(None);
                }
                let len = u32::from_be_bytes(src[..4].try_into().unwrap());
                if len > MAX_FRAME_LEN {
                    return Err(FrameCodecError::TooLarge(len));
                }
                if len < 3 {
                    return Err(FrameCodecError::Framing(format!(
                        "frame length {len} too short for version/type/flags header"
                    )));
                }
                self.next_len = Some(len);
                len
            }
        };

        // 4 (length prefix) + body_len must be fully buffered.
        if src.len() < 4 + body_len as usize {
            src.reserve(4 + body_len as usize - src.len());
            return Ok(None);
        }

        src.advance(4);
        let version = src.get_u8();
        let msg_type = MessageType(src.get_u8());
        let flags = src.get_u8();
        let payload_len = body_len as usize - 3;
        let raw = src.split_to(payload_len).freeze();
        self.next_len = None;

        let payload = if flags & FLAG_COMPRESSED != 0 {
            let mut decoder = DeflateDecoder::new(&raw[..]);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Bytes::from(out)
        } else {
            raw
        };

        Ok(Some(DecodedFrame {
            version,
            msg_type,
            flags,
            payload,
        }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameCodecError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body_len = 1 + 1 + 1 + frame.payload.len();
        dst.reserve(4 + body_len);
        dst.put_u32(body_len as u32);
        dst.put_u8(frame.version);
        dst.put_u8(frame.msg_type.0);
        dst.put_u8(frame.flags);
        dst.put_slice(&frame.payload);
        Ok(())
    }
}

/// Encoder impl for pre-encoded bytes (used by the broadcast engine, which
/// hands connections already-framed bytes rather than a logical `Frame`).
impl Encoder<Bytes> for FrameCodec {
    type Error = FrameCodecError;

    fn encode(&mut self, raw: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::{encode_broadcast, PROTOCOL_V1};

    #[test]
    fn round_trips_uncompressed_frame() {
        let mut codec = FrameCodec::new();
        let frame = Frame::new(PROTOCOL_V1, MessageType::PING, Bytes::from_static(b"hi"));
        let mut buf = BytesMut::new();
        codec.encode(frame.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.version, frame.version);
        assert_eq!(decoded.msg_type, frame.msg_type);
        assert_eq!(decoded.payload, frame.payload);
    }

    #[test]
    fn decode_returns_none_on_partial_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0, 0, 0, 10]);
        buf.extend_from_slice(&[1, 2]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_rejects_oversized_length() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&(MAX_FRAME_LEN + 1).to_be_bytes());
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn decode_transparently_inflates_compressed_payload() {
        let payload = vec![b'x'; 4096];
        let encoded = encode_broadcast(MessageType::NEW_MESSAGE, &payload);
        let v2 = encoded.v2.expect("repetitive payload compresses");

        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&v2);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.payload.as_ref(), payload.as_slice());
    }
}
