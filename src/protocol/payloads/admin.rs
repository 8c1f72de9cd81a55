use bytes::{Buf, BufMut};

use crate::protocol::wire::*;

#[derive(Debug, Clone)]
pub struct BanUser {
    pub user_id: u64,
    pub reason: String,
    pub duration_seconds: Option<u64>,
}

impl BanUser {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.user_id);
        put_string(buf, &self.reason);
        put_optional_u64(buf, self.duration_seconds);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            user_id: get_u64(buf)?,
            reason: get_string(buf)?,
            duration_seconds: get_optional_u64(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BanIp {
    pub ip: String,
    pub reason: String,
    pub duration_seconds: Option<u64>,
}

impl BanIp {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_string(buf, &self.ip);
        put_string(buf, &self.reason);
        put_optional_u64(buf, self.duration_seconds);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            ip: get_string(buf)?,
            reason: get_string(buf)?,
            duration_seconds: get_optional_u64(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UnbanUser {
    pub user_id: u64,
}

impl UnbanUser {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.user_id);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            user_id: get_u64(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UnbanIp {
    pub ip: String,
}

impl UnbanIp {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_string(buf, &self.ip);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self { ip: get_string(buf)? })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListBans;

impl ListBans {
    pub fn encode(&self, _buf: &mut impl BufMut) {}
    pub fn decode(_buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self)
    }
}

/// `target`: 0 = user ban, 1 = IP ban.
#[derive(Debug, Clone)]
pub struct BanInfo {
    pub id: u64,
    pub target: u8,
    pub user_id: Option<u64>,
    pub ip: Option<String>,
    pub reason: String,
    pub banned_by: String,
    pub banned_at: i64,
    pub expires_at: Option<i64>,
}

impl BanInfo {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.id);
        buf.put_u8(self.target);
        put_optional_u64(buf, self.user_id);
        put_optional_string(buf, self.ip.as_deref());
        put_string(buf, &self.reason);
        put_string(buf, &self.banned_by);
        buf.put_i64(self.banned_at);
        put_optional_u64(buf, self.expires_at.map(|v| v as u64));
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            id: get_u64(buf)?,
            target: get_u8(buf)?,
            user_id: get_optional_u64(buf)?,
            ip: get_optional_string(buf)?,
            reason: get_string(buf)?,
            banned_by: get_string(buf)?,
            banned_at: get_i64(buf)?,
            expires_at: get_optional_u64(buf)?.map(|v| v as i64),
        })
    }
}

#[derive(Debug, Clone)]
pub struct BanList {
    pub bans: Vec<BanInfo>,
}

impl BanList {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.bans.len() as u32);
        for b in &self.bans {
            b.encode(buf);
        }
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        let count = get_u32(buf)?;
        let mut bans = Vec::with_capacity(count as usize);
        for _ in 0..count {
            bans.push(BanInfo::decode(buf)?);
        }
        Ok(Self { bans })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteUser {
    pub user_id: u64,
}

impl DeleteUser {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.user_id);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            user_id: get_u64(buf)?,
        })
    }
}

/// Generic success/message reply shared by the admin operations above.
#[derive(Debug, Clone)]
pub struct AdminResponse {
    pub success: bool,
    pub message: String,
}

impl AdminResponse {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.success as u8);
        put_string(buf, &self.message);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            success: get_u8(buf)? != 0,
            message: get_string(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn ban_info_round_trips_with_ip_target() {
        let info = BanInfo {
            id: 7,
            target: 1,
            user_id: None,
            ip: Some("203.0.113.5".to_string()),
            reason: "spam".to_string(),
            banned_by: "root".to_string(),
            banned_at: 1000,
            expires_at: None,
        };
        let mut buf = BytesMut::new();
        info.encode(&mut buf);
        let mut slice = &buf[..];
        let decoded = BanInfo::decode(&mut slice).unwrap();
        assert_eq!(decoded.ip.as_deref(), Some("203.0.113.5"));
        assert_eq!(decoded.user_id, None);
    }
}
