use bytes::{Buf, BufMut};

use crate::protocol::wire::*;

#[derive(Debug, Clone, Copy, Default)]
pub struct ListChannels;

impl ListChannels {
    pub fn encode(&self, _buf: &mut impl BufMut) {}
    pub fn decode(_buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self)
    }
}

#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: u64,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub channel_type: u8,
    pub retention_hours: u32,
    pub is_private: bool,
    pub is_dm: bool,
    pub parent_id: Option<u64>,
    pub created_at: i64,
}

impl ChannelInfo {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.id);
        put_string(buf, &self.name);
        put_string(buf, &self.display_name);
        put_string(buf, &self.description);
        buf.put_u8(self.channel_type);
        buf.put_u32(self.retention_hours);
        buf.put_u8(self.is_private as u8);
        buf.put_u8(self.is_dm as u8);
        put_optional_u64(buf, self.parent_id);
        buf.put_i64(self.created_at);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            id: get_u64(buf)?,
            name: get_string(buf)?,
            display_name: get_string(buf)?,
            description: get_string(buf)?,
            channel_type: get_u8(buf)?,
            retention_hours: get_u32(buf)?,
            is_private: get_u8(buf)? != 0,
            is_dm: get_u8(buf)? != 0,
            parent_id: get_optional_u64(buf)?,
            created_at: get_i64(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChannelList {
    pub channels: Vec<ChannelInfo>,
}

impl ChannelList {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.channels.len() as u32);
        for c in &self.channels {
            c.encode(buf);
        }
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        let count = get_u32(buf)?;
        let mut channels = Vec::with_capacity(count as usize);
        for _ in 0..count {
            channels.push(ChannelInfo::decode(buf)?);
        }
        Ok(Self { channels })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JoinChannel {
    pub channel_id: u64,
}

impl JoinChannel {
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
pub struct JoinResponse {
    pub success: bool,
    pub channel_id: Option<u64>,
    pub message: String,
}

impl JoinResponse {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.success as u8);
        put_optional_u64(buf, self.channel_id);
        put_string(buf, &self.message);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            success: get_u8(buf)? != 0,
            channel_id: get_optional_u64(buf)?,
            message: get_string(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LeaveChannel {
    pub channel_id: u64,
}

impl LeaveChannel {
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
pub struct LeaveResponse {
    pub success: bool,
    pub message: String,
}

impl LeaveResponse {
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

#[derive(Debug, Clone)]
pub struct CreateChannel {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub channel_type: u8,
    pub retention_hours: u32,
    pub is_private: bool,
}

impl CreateChannel {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_string(buf, &self.name);
        put_string(buf, &self.display_name);
        put_string(buf, &self.description);
        buf.put_u8(self.channel_type);
        buf.put_u32(self.retention_hours);
        buf.put_u8(self.is_private as u8);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            name: get_string(buf)?,
            display_name: get_string(buf)?,
            description: get_string(buf)?,
            channel_type: get_u8(buf)?,
            retention_hours: get_u32(buf)?,
            is_private: get_u8(buf)? != 0,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChannelCreated {
    pub success: bool,
    pub channel_id: Option<u64>,
    pub message: String,
}

impl ChannelCreated {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.success as u8);
        put_optional_u64(buf, self.channel_id);
        put_string(buf, &self.message);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            success: get_u8(buf)? != 0,
            channel_id: get_optional_u64(buf)?,
            message: get_string(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CreateSubchannel {
    pub parent_id: u64,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub channel_type: u8,
    pub retention_hours: u32,
    pub is_private: bool,
}

impl CreateSubchannel {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.parent_id);
        put_string(buf, &self.name);
        put_string(buf, &self.display_name);
        put_string(buf, &self.description);
        buf.put_u8(self.channel_type);
        buf.put_u32(self.retention_hours);
        buf.put_u8(self.is_private as u8);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            parent_id: get_u64(buf)?,
            name: get_string(buf)?,
            display_name: get_string(buf)?,
            description: get_string(buf)?,
            channel_type: get_u8(buf)?,
            retention_hours: get_u32(buf)?,
            is_private: get_u8(buf)? != 0,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteChannel {
    pub channel_id: u64,
}

impl DeleteChannel {
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
pub struct ChannelDeleted {
    pub success: bool,
    pub channel_id: u64,
    pub message: String,
}

impl ChannelDeleted {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.success as u8);
        buf.put_u64(self.channel_id);
        put_string(buf, &self.message);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            success: get_u8(buf)? != 0,
            channel_id: get_u64(buf)?,
            message: get_string(buf)?,
        })
    }
}
