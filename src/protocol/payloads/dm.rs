use bytes::{Buf, BufMut};

use crate::protocol::wire::*;

#[derive(Debug, Clone)]
pub struct StartDm {
    pub target_nickname: String,
    pub allow_unencrypted: bool,
}

impl StartDm {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_string(buf, &self.target_nickname);
        buf.put_u8(self.allow_unencrypted as u8);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            target_nickname: get_string(buf)?,
            allow_unencrypted: get_u8(buf)? != 0,
        })
    }
}

/// A 32-byte X25519-style public key, carried as a length-prefixed blob
/// rather than a fixed-size field so malformed keys decode to an error
/// instead of silently truncating/padding.
#[derive(Debug, Clone)]
pub struct ProvidePublicKey {
    pub public_key: Vec<u8>,
}

impl ProvidePublicKey {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_blob(buf, &self.public_key);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            public_key: get_blob(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AllowUnencrypted {
    pub channel_id: u64,
}

impl AllowUnencrypted {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.channel_id);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            channel_id: get_u64(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeclineDm {
    pub channel_id: u64,
}

impl DeclineDm {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.channel_id);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            channel_id: get_u64(buf)?,
        })
    }
}

/// Sent to the initiator when the peer has no key on file yet and must be
/// prompted to supply one (or allow an unencrypted fallback) before the
/// channel opens.
#[derive(Debug, Clone)]
pub struct KeyRequired {
    pub channel_id: u64,
    pub peer_nickname: String,
}

impl KeyRequired {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.channel_id);
        put_string(buf, &self.peer_nickname);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            channel_id: get_u64(buf)?,
            peer_nickname: get_string(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DmReady {
    pub channel_id: u64,
    pub peer_nickname: String,
    pub is_encrypted: bool,
    pub peer_public_key: Option<Vec<u8>>,
}

impl DmReady {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.channel_id);
        put_string(buf, &self.peer_nickname);
        buf.put_u8(self.is_encrypted as u8);
        match &self.peer_public_key {
            Some(key) => {
                buf.put_u8(1);
                put_blob(buf, key);
            }
            None => buf.put_u8(0),
        }
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        let channel_id = get_u64(buf)?;
        let peer_nickname = get_string(buf)?;
        let is_encrypted = get_u8(buf)? != 0;
        let peer_public_key = if get_present_flag(buf)? {
            Some(get_blob(buf)?)
        } else {
            None
        };
        Ok(Self {
            channel_id,
            peer_nickname,
            is_encrypted,
            peer_public_key,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DmPending {
    pub channel_id: u64,
}

impl DmPending {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.channel_id);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            channel_id: get_u64(buf)?,
        })
    }
}

/// `encryption_status`: 0 = NotPossible, 1 = Required, 2 = Optional.
pub const ENCRYPTION_NOT_POSSIBLE: u8 = 0;
pub const ENCRYPTION_REQUIRED: u8 = 1;
pub const ENCRYPTION_OPTIONAL: u8 = 2;

/// Delivered to the recipient of a freshly started DM.
#[derive(Debug, Clone)]
pub struct DmRequest {
    pub channel_id: u64,
    pub from_nickname: String,
    pub encryption_status: u8,
}

impl DmRequest {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.channel_id);
        put_string(buf, &self.from_nickname);
        buf.put_u8(self.encryption_status);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            channel_id: get_u64(buf)?,
            from_nickname: get_string(buf)?,
            encryption_status: get_u8(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DmParticipantLeft {
    pub channel_id: u64,
    pub nickname: String,
}

impl DmParticipantLeft {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.channel_id);
        put_string(buf, &self.nickname);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            channel_id: get_u64(buf)?,
            nickname: get_string(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DmDeclined {
    pub channel_id: u64,
}

impl DmDeclined {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.channel_id);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            channel_id: get_u64(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn dm_ready_round_trips_without_peer_key() {
        let msg = DmReady {
            channel_id: 42,
            peer_nickname: "alice".to_string(),
            is_encrypted: false,
            peer_public_key: None,
        };
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let mut slice = &buf[..];
        let decoded = DmReady::decode(&mut slice).unwrap();
        assert_eq!(decoded.peer_nickname, "alice");
        assert!(decoded.peer_public_key.is_none());
    }
}
