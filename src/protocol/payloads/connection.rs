use bytes::{Buf, BufMut};

use crate::protocol::wire::*;

/// Sent by the server immediately on connect, before any client message.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub sid: String,
    pub server_name: String,
    pub description: String,
    pub max_users: u32,
    pub protocol_version: u8,
}

impl ServerConfig {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_string(buf, &self.sid);
        put_string(buf, &self.server_name);
        put_string(buf, &self.description);
        buf.put_u32(self.max_users);
        buf.put_u8(self.protocol_version);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            sid: get_string(buf)?,
            server_name: get_string(buf)?,
            description: get_string(buf)?,
            max_users: get_u32(buf)?,
            protocol_version: get_u8(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ping {
    pub timestamp: i64,
}

impl Ping {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.timestamp);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            timestamp: get_i64(buf)?,
        })
    }
}

pub type Pong = Ping;

#[derive(Debug, Clone)]
pub struct Disconnect {
    pub reason: Option<String>,
}

impl Disconnect {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_optional_string(buf, self.reason.as_deref());
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            reason: get_optional_string(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn server_config_round_trips() {
        let cfg = ServerConfig {
            sid: "abc123".into(),
            server_name: "Test Server".into(),
            description: "a test".into(),
            max_users: 500,
            protocol_version: 2,
        };
        let mut buf = BytesMut::new();
        cfg.encode(&mut buf);
        let mut read = buf.freeze();
        let decoded = ServerConfig::decode(&mut read).unwrap();
        assert_eq!(decoded.sid, cfg.sid);
        assert_eq!(decoded.max_users, cfg.max_users);
    }
}
