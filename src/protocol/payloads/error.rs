//! Wire-level `ERROR(0xFF)` payload (spec §4.8/§7): a numeric code plus a
//! human-readable message, sent in place of a normal response when a
//! handler fails.

use bytes::{Buf, BufMut};

use crate::error::{ErrorCode, HandlerError};
use crate::protocol::wire::*;

#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl ErrorResponse {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.code);
        put_string(buf, &self.message);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            code: get_u16(buf)?,
            message: get_string(buf)?,
        })
    }
}

impl From<ErrorCode> for ErrorResponse {
    fn from(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            message: String::new(),
        }
    }
}

/// Builds the frame payload for a `HandlerError`. `Quit` has no wire
/// representation and is unreachable here — the caller handles it before
/// this conversion.
impl From<&HandlerError> for ErrorResponse {
    fn from(err: &HandlerError) -> Self {
        Self {
            code: err.code().code(),
            message: err.client_message().unwrap_or_else(|| "internal error".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn error_response_round_trips() {
        let resp = ErrorResponse {
            code: ErrorCode::MessageTooLong.code(),
            message: "message exceeds maximum length".into(),
        };
        let mut buf = BytesMut::new();
        resp.encode(&mut buf);
        let mut read = buf.freeze();
        let decoded = ErrorResponse::decode(&mut read).unwrap();
        assert_eq!(decoded.code, resp.code);
        assert_eq!(decoded.message, resp.message);
    }

    #[test]
    fn handler_error_converts_to_wire_payload() {
        let err = HandlerError::new(ErrorCode::NotRegistered, "nickname not set");
        let resp: ErrorResponse = (&err).into();
        assert_eq!(resp.code, ErrorCode::NotRegistered.code());
        assert_eq!(resp.message, "nickname not set");
    }
}
