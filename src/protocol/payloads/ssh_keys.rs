use bytes::{Buf, BufMut};

use crate::protocol::wire::*;

#[derive(Debug, Clone)]
pub struct AddSshKey {
    pub public_key: String,
    pub label: String,
}

impl AddSshKey {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_string(buf, &self.public_key);
        put_string(buf, &self.label);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            public_key: get_string(buf)?,
            label: get_string(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SshKeyResponse {
    pub success: bool,
    pub key_id: Option<u64>,
    pub fingerprint: Option<String>,
    pub message: String,
}

impl SshKeyResponse {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.success as u8);
        put_optional_u64(buf, self.key_id);
        put_optional_string(buf, self.fingerprint.as_deref());
        put_string(buf, &self.message);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            success: get_u8(buf)? != 0,
            key_id: get_optional_u64(buf)?,
            fingerprint: get_optional_string(buf)?,
            message: get_string(buf)?,
        })
    }
}

/// Empty request; responds with the caller's own keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListSshKeys;

impl ListSshKeys {
    pub fn encode(&self, _buf: &mut impl BufMut) {}
    pub fn decode(_buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self)
    }
}

#[derive(Debug, Clone)]
pub struct SshKeyInfo {
    pub id: u64,
    pub fingerprint: String,
    pub key_type: String,
    pub label: String,
    pub added_at: i64,
    pub last_used: Option<i64>,
}

impl SshKeyInfo {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.id);
        put_string(buf, &self.fingerprint);
        put_string(buf, &self.key_type);
        put_string(buf, &self.label);
        buf.put_i64(self.added_at);
        put_optional_u64(buf, self.last_used.map(|v| v as u64));
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            id: get_u64(buf)?,
            fingerprint: get_string(buf)?,
            key_type: get_string(buf)?,
            label: get_string(buf)?,
            added_at: get_i64(buf)?,
            last_used: get_optional_u64(buf)?.map(|v| v as i64),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SshKeyList {
    pub keys: Vec<SshKeyInfo>,
}

impl SshKeyList {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.keys.len() as u32);
        for key in &self.keys {
            key.encode(buf);
        }
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        let count = get_u32(buf)?;
        let mut keys = Vec::with_capacity(count as usize);
        for _ in 0..count {
            keys.push(SshKeyInfo::decode(buf)?);
        }
        Ok(Self { keys })
    }
}

#[derive(Debug, Clone)]
pub struct UpdateSshKey {
    pub key_id: u64,
    pub label: String,
}

impl UpdateSshKey {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.key_id);
        put_string(buf, &self.label);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            key_id: get_u64(buf)?,
            label: get_string(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteSshKey {
    pub key_id: u64,
}

impl DeleteSshKey {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.key_id);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            key_id: get_u64(buf)?,
        })
    }
}
