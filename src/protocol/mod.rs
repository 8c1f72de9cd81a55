//! The wire protocol: frame header, codec, opcode table, and per-message
//! payload encodings (spec §4.1 / §6).

pub mod codec;
pub mod frame;
pub mod payloads;
pub mod types;
pub mod wire;

pub use codec::{DecodedFrame, FrameCodec};
pub use frame::{encode_broadcast, EncodedBroadcast, Frame, PROTOCOL_V1, PROTOCOL_V2};
pub use types::MessageType;
