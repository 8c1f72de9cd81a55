use bytes::{Buf, BufMut};

use crate::protocol::wire::*;

#[derive(Debug, Clone, Copy, Default)]
pub struct ListServers;

impl ListServers {
    pub fn encode(&self, _buf: &mut impl BufMut) {}
    pub fn decode(_buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self)
    }
}

#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub hostname: String,
    pub port: u16,
    pub name: String,
    pub description: String,
    pub user_count: u32,
    pub channel_count: u32,
    pub max_users: u32,
    pub uptime_seconds: u64,
    pub is_public: bool,
    pub heartbeat_interval: u32,
    pub last_heartbeat: i64,
}

impl ServerInfo {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_string(buf, &self.hostname);
        buf.put_u16(self.port);
        put_string(buf, &self.name);
        put_string(buf, &self.description);
        buf.put_u32(self.user_count);
        buf.put_u32(self.channel_count);
        buf.put_u32(self.max_users);
        buf.put_u64(self.uptime_seconds);
        buf.put_u8(self.is_public as u8);
        buf.put_u32(self.heartbeat_interval);
        buf.put_i64(self.last_heartbeat);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            hostname: get_string(buf)?,
            port: get_u16(buf)?,
            name: get_string(buf)?,
            description: get_string(buf)?,
            user_count: get_u32(buf)?,
            channel_count: get_u32(buf)?,
            max_users: get_u32(buf)?,
            uptime_seconds: get_u64(buf)?,
            is_public: get_u8(buf)? != 0,
            heartbeat_interval: get_u32(buf)?,
            last_heartbeat: get_i64(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerList {
    pub servers: Vec<ServerInfo>,
}

impl ServerList {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.servers.len() as u32);
        for s in &self.servers {
            s.encode(buf);
        }
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        let count = get_u32(buf)?;
        let mut servers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            servers.push(ServerInfo::decode(buf)?);
        }
        Ok(Self { servers })
    }
}

#[derive(Debug, Clone)]
pub struct RegisterServer {
    pub hostname: String,
    pub port: u16,
    pub name: String,
    pub description: String,
    pub max_users: u32,
    pub is_public: bool,
}

impl RegisterServer {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_string(buf, &self.hostname);
        buf.put_u16(self.port);
        put_string(buf, &self.name);
        put_string(buf, &self.description);
        buf.put_u32(self.max_users);
        buf.put_u8(self.is_public as u8);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            hostname: get_string(buf)?,
            port: get_u16(buf)?,
            name: get_string(buf)?,
            description: get_string(buf)?,
            max_users: get_u32(buf)?,
            is_public: get_u8(buf)? != 0,
        })
    }
}

/// Sent immediately on `REGISTER_SERVER` with `success=false`; the real
/// verdict arrives later via the dial-back handshake, not a second ack.
#[derive(Debug, Clone)]
pub struct RegisterAck {
    pub success: bool,
    pub message: String,
}

impl RegisterAck {
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

#[derive(Debug, Clone, Copy)]
pub struct VerifyRegistration {
    pub challenge: u64,
}

impl VerifyRegistration {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.challenge);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            challenge: get_u64(buf)?,
        })
    }
}

pub type VerifyResponse = VerifyRegistration;

#[derive(Debug, Clone)]
pub struct Heartbeat {
    pub user_count: u32,
    pub channel_count: u32,
}

impl Heartbeat {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.user_count);
        buf.put_u32(self.channel_count);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            user_count: get_u32(buf)?,
            channel_count: get_u32(buf)?,
        })
    }
}

/// `next_interval_seconds` echoes the directory's size-tiered adaptive
/// cadence back to the leaf.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatAck {
    pub next_interval_seconds: u32,
}

impl HeartbeatAck {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.next_interval_seconds);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            next_interval_seconds: get_u32(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn server_info_round_trips() {
        let info = ServerInfo {
            hostname: "chat.example.org".to_string(),
            port: 6697,
            name: "Example".to_string(),
            description: "A server".to_string(),
            user_count: 12,
            channel_count: 4,
            max_users: 100,
            uptime_seconds: 86_400,
            is_public: true,
            heartbeat_interval: 300,
            last_heartbeat: 1_700_000_000,
        };
        let mut buf = BytesMut::new();
        info.encode(&mut buf);
        let mut slice = &buf[..];
        let decoded = ServerInfo::decode(&mut slice).unwrap();
        assert_eq!(decoded.hostname, "chat.example.org");
        assert_eq!(decoded.port, 6697);
        assert!(decoded.is_public);
    }

    #[test]
    fn verify_challenge_round_trips() {
        let req = VerifyRegistration { challenge: 0xdead_beef_cafe_babe };
        let mut buf = BytesMut::new();
        req.encode(&mut buf);
        let mut slice = &buf[..];
        let decoded = VerifyRegistration::decode(&mut slice).unwrap();
        assert_eq!(decoded.challenge, req.challenge);
    }
}
