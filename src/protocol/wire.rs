//! Primitive read/write helpers for payload encoding (spec §4.1).
//!
//! Scalars are big-endian; strings are `u16` length + UTF-8 bytes;
//! optionals are `u8` present flag + value; arrays carry an explicit `u32`
//! count; byte blobs are `u32`-length-prefixed.

use bytes::{Buf, BufMut};

use crate::error::ErrorCode;

#[derive(Debug, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct DecodeError {
    pub code: ErrorCode,
    pub message: String,
}

impl DecodeError {
    fn format(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidFormat,
            message: message.into(),
        }
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;

pub fn put_string(buf: &mut impl BufMut, s: &str) {
    let bytes = s.as_bytes();
    debug_assert!(bytes.len() <= u16::MAX as usize, "string too long to encode");
    buf.put_u16(bytes.len() as u16);
    buf.put_slice(bytes);
}

pub fn get_string(buf: &mut impl Buf) -> DecodeResult<String> {
    if buf.remaining() < 2 {
        return Err(DecodeError::format("truncated string length"));
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(DecodeError::format("truncated string body"));
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| DecodeError::format("string is not valid UTF-8"))
}

pub fn put_optional_string(buf: &mut impl BufMut, s: Option<&str>) {
    match s {
        Some(s) => {
            buf.put_u8(1);
            put_string(buf, s);
        }
        None => buf.put_u8(0),
    }
}

pub fn get_optional_string(buf: &mut impl Buf) -> DecodeResult<Option<String>> {
    match get_present_flag(buf)? {
        true => Ok(Some(get_string(buf)?)),
        false => Ok(None),
    }
}

pub fn put_optional_u64(buf: &mut impl BufMut, v: Option<u64>) {
    match v {
        Some(v) => {
            buf.put_u8(1);
            buf.put_u64(v);
        }
        None => buf.put_u8(0),
    }
}

pub fn get_optional_u64(buf: &mut impl Buf) -> DecodeResult<Option<u64>> {
    match get_present_flag(buf)? {
        true => Ok(Some(get_u64(buf)?)),
        false => Ok(None),
    }
}

pub fn put_blob(buf: &mut impl BufMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

pub fn get_blob(buf: &mut impl Buf) -> DecodeResult<Vec<u8>> {
    if buf.remaining() < 4 {
        return Err(DecodeError::format("truncated blob length"));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(DecodeError::format("truncated blob body"));
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    Ok(bytes)
}

pub fn get_present_flag(buf: &mut impl Buf) -> DecodeResult<bool> {
    if buf.remaining() < 1 {
        return Err(DecodeError::format("truncated optional flag"));
    }
    match buf.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DecodeError::format(format!("invalid optional flag {other}"))),
    }
}

pub fn get_u8(buf: &mut impl Buf) -> DecodeResult<u8> {
    if buf.remaining() < 1 {
        return Err(DecodeError::format("truncated u8"));
    }
    Ok(buf.get_u8())
}

pub fn get_u16(buf: &mut impl Buf) -> DecodeResult<u16> {
    if buf.remaining() < 2 {
        return Err(DecodeError::format("truncated u16"));
    }
    Ok(buf.get_u16())
}

pub fn get_u32(buf: &mut impl Buf) -> DecodeResult<u32> {
    if buf.remaining() < 4 {
        return Err(DecodeError::format("truncated u32"));
    }
    Ok(buf.get_u32())
}

pub fn get_u64(buf: &mut impl Buf) -> DecodeResult<u64> {
    if buf.remaining() < 8 {
        return Err(DecodeError::format("truncated u64"));
    }
    Ok(buf.get_u64())
}

pub fn get_i64(buf: &mut impl Buf) -> DecodeResult<i64> {
    Ok(get_u64(buf)? as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn string_round_trips() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, "hello");
        let mut read = buf.freeze();
        assert_eq!(get_string(&mut read).unwrap(), "hello");
    }

    #[test]
    fn optional_string_none_round_trips() {
        let mut buf = BytesMut::new();
        put_optional_string(&mut buf, None);
        let mut read = buf.freeze();
        assert_eq!(get_optional_string(&mut read).unwrap(), None);
    }

    #[test]
    fn optional_u64_some_round_trips() {
        let mut buf = BytesMut::new();
        put_optional_u64(&mut buf, Some(42));
        let mut read = buf.freeze();
        assert_eq!(get_optional_u64(&mut read).unwrap(), Some(42));
    }

    #[test]
    fn blob_round_trips() {
        let mut buf = BytesMut::new();
        put_blob(&mut buf, &[1, 2, 3, 4]);
        let mut read = buf.freeze();
        assert_eq!(get_blob(&mut read).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn truncated_string_is_framing_error() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0, 10]); // claims 10 bytes, has 0
        let mut read = buf.freeze();
        assert!(get_string(&mut read).is_err());
    }

    #[test]
    fn invalid_optional_flag_rejected() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[7]);
        let mut read = buf.freeze();
        assert!(get_present_flag(&mut read).is_err());
    }
}
