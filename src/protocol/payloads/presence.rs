use bytes::{Buf, BufMut};

use crate::protocol::wire::*;

/// `event`: 0 = joined server, 1 = left server.
#[derive(Debug, Clone)]
pub struct ServerPresence {
    pub nickname: String,
    pub event: u8,
}

impl ServerPresence {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_string(buf, &self.nickname);
        buf.put_u8(self.event);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            nickname: get_string(buf)?,
            event: get_u8(buf)?,
        })
    }
}

/// `event`: 0 = joined channel, 1 = left channel.
#[derive(Debug, Clone)]
pub struct ChannelPresence {
    pub channel_id: u64,
    pub nickname: String,
    pub event: u8,
}

impl ChannelPresence {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.channel_id);
        put_string(buf, &self.nickname);
        buf.put_u8(self.event);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            channel_id: get_u64(buf)?,
            nickname: get_string(buf)?,
            event: get_u8(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GetUserInfo {
    pub user_id: Option<u64>,
    pub nickname: Option<String>,
}

impl GetUserInfo {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_optional_u64(buf, self.user_id);
        put_optional_string(buf, self.nickname.as_deref());
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            user_id: get_optional_u64(buf)?,
            nickname: get_optional_string(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UserInfo {
    pub success: bool,
    pub user_id: Option<u64>,
    pub nickname: Option<String>,
    pub flags: Option<u8>,
    pub created_at: Option<i64>,
    pub last_seen: Option<i64>,
    pub message: String,
}

impl UserInfo {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.success as u8);
        put_optional_u64(buf, self.user_id);
        put_optional_string(buf, self.nickname.as_deref());
        match self.flags {
            Some(f) => {
                buf.put_u8(1);
                buf.put_u8(f);
            }
            None => buf.put_u8(0),
        }
        put_optional_u64(buf, self.created_at.map(|v| v as u64));
        put_optional_u64(buf, self.last_seen.map(|v| v as u64));
        put_string(buf, &self.message);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        let success = get_u8(buf)? != 0;
        let user_id = get_optional_u64(buf)?;
        let nickname = get_optional_string(buf)?;
        let flags = if get_present_flag(buf)? {
            Some(get_u8(buf)?)
        } else {
            None
        };
        let created_at = get_optional_u64(buf)?.map(|v| v as i64);
        let last_seen = get_optional_u64(buf)?.map(|v| v as i64);
        let message = get_string(buf)?;
        Ok(Self {
            success,
            user_id,
            nickname,
            flags,
            created_at,
            last_seen,
            message,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListUsers;

impl ListUsers {
    pub fn encode(&self, _buf: &mut impl BufMut) {}
    pub fn decode(_buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self)
    }
}

#[derive(Debug, Clone)]
pub struct UserSummary {
    pub user_id: u64,
    pub nickname: String,
    pub flags: u8,
}

impl UserSummary {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.user_id);
        put_string(buf, &self.nickname);
        buf.put_u8(self.flags);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            user_id: get_u64(buf)?,
            nickname: get_string(buf)?,
            flags: get_u8(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UserList {
    pub users: Vec<UserSummary>,
}

impl UserList {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.users.len() as u32);
        for u in &self.users {
            u.encode(buf);
        }
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        let count = get_u32(buf)?;
        let mut users = Vec::with_capacity(count as usize);
        for _ in 0..count {
            users.push(UserSummary::decode(buf)?);
        }
        Ok(Self { users })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListChannelUsers {
    pub channel_id: u64,
}

impl ListChannelUsers {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.channel_id);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            channel_id: get_u64(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChannelUserList {
    pub channel_id: u64,
    pub users: Vec<UserSummary>,
}

impl ChannelUserList {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.channel_id);
        buf.put_u32(self.users.len() as u32);
        for u in &self.users {
            u.encode(buf);
        }
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        let channel_id = get_u64(buf)?;
        let count = get_u32(buf)?;
        let mut users = Vec::with_capacity(count as usize);
        for _ in 0..count {
            users.push(UserSummary::decode(buf)?);
        }
        Ok(Self { channel_id, users })
    }
}
