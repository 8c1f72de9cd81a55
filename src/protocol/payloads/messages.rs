use bytes::{Buf, BufMut};

use crate::protocol::wire::*;

#[derive(Debug, Clone)]
pub struct PostMessage {
    pub channel_id: u64,
    pub subchannel_id: Option<u64>,
    pub parent_id: Option<u64>,
    pub content: String,
}

impl PostMessage {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.channel_id);
        put_optional_u64(buf, self.subchannel_id);
        put_optional_u64(buf, self.parent_id);
        put_string(buf, &self.content);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            channel_id: get_u64(buf)?,
            subchannel_id: get_optional_u64(buf)?,
            parent_id: get_optional_u64(buf)?,
            content: get_string(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MessagePosted {
    pub success: bool,
    pub message_id: Option<u64>,
    pub thread_root_id: Option<u64>,
    pub message: String,
}

impl MessagePosted {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.success as u8);
        put_optional_u64(buf, self.message_id);
        put_optional_u64(buf, self.thread_root_id);
        put_string(buf, &self.message);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            success: get_u8(buf)? != 0,
            message_id: get_optional_u64(buf)?,
            thread_root_id: get_optional_u64(buf)?,
            message: get_string(buf)?,
        })
    }
}

/// Either `parent_id` (list replies under a thread) or `channel_id` (list
/// roots) selects the scope; the two cursor fields are mutually exclusive
/// (spec's Open Question: combined use is rejected with `INVALID_INPUT`,
/// enforced by the handler, not this codec).
#[derive(Debug, Clone)]
pub struct ListMessages {
    pub channel_id: u64,
    pub subchannel_id: Option<u64>,
    pub parent_id: Option<u64>,
    pub limit: u32,
    pub before_id: Option<u64>,
    pub after_id: Option<u64>,
}

impl ListMessages {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.channel_id);
        put_optional_u64(buf, self.subchannel_id);
        put_optional_u64(buf, self.parent_id);
        buf.put_u32(self.limit);
        put_optional_u64(buf, self.before_id);
        put_optional_u64(buf, self.after_id);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            channel_id: get_u64(buf)?,
            subchannel_id: get_optional_u64(buf)?,
            parent_id: get_optional_u64(buf)?,
            limit: get_u32(buf)?,
            before_id: get_optional_u64(buf)?,
            after_id: get_optional_u64(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MessageInfo {
    pub id: u64,
    pub channel_id: u64,
    pub subchannel_id: Option<u64>,
    pub parent_id: Option<u64>,
    pub thread_root_id: Option<u64>,
    pub author_user_id: Option<u64>,
    pub author_nickname: String,
    pub content: String,
    pub created_at: i64,
    pub edited_at: Option<i64>,
    pub deleted_at: Option<i64>,
}

impl MessageInfo {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.id);
        buf.put_u64(self.channel_id);
        put_optional_u64(buf, self.subchannel_id);
        put_optional_u64(buf, self.parent_id);
        put_optional_u64(buf, self.thread_root_id);
        put_optional_u64(buf, self.author_user_id);
        put_string(buf, &self.author_nickname);
        put_string(buf, &self.content);
        buf.put_i64(self.created_at);
        put_optional_u64(buf, self.edited_at.map(|v| v as u64));
        put_optional_u64(buf, self.deleted_at.map(|v| v as u64));
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            id: get_u64(buf)?,
            channel_id: get_u64(buf)?,
            subchannel_id: get_optional_u64(buf)?,
            parent_id: get_optional_u64(buf)?,
            thread_root_id: get_optional_u64(buf)?,
            author_user_id: get_optional_u64(buf)?,
            author_nickname: get_string(buf)?,
            content: get_string(buf)?,
            created_at: get_i64(buf)?,
            edited_at: get_optional_u64(buf)?.map(|v| v as i64),
            deleted_at: get_optional_u64(buf)?.map(|v| v as i64),
        })
    }
}

#[derive(Debug, Clone)]
pub struct MessageList {
    pub messages: Vec<MessageInfo>,
}

impl MessageList {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.messages.len() as u32);
        for m in &self.messages {
            m.encode(buf);
        }
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        let count = get_u32(buf)?;
        let mut messages = Vec::with_capacity(count as usize);
        for _ in 0..count {
            messages.push(MessageInfo::decode(buf)?);
        }
        Ok(Self { messages })
    }
}

#[derive(Debug, Clone)]
pub struct EditMessage {
    pub message_id: u64,
    pub content: String,
}

impl EditMessage {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.message_id);
        put_string(buf, &self.content);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            message_id: get_u64(buf)?,
            content: get_string(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MessageEditResponse {
    pub success: bool,
    pub message: String,
}

impl MessageEditResponse {
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
pub struct DeleteMessage {
    pub message_id: u64,
}

impl DeleteMessage {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.message_id);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            message_id: get_u64(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MessageDeleteResponse {
    pub success: bool,
    pub message: String,
}

impl MessageDeleteResponse {
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

/// Broadcast on post; payload is the posted message in full.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub message: MessageInfo,
}

impl NewMessage {
    pub fn encode(&self, buf: &mut impl BufMut) {
        self.message.encode(buf);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            message: MessageInfo::decode(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MessageEdited {
    pub message_id: u64,
    pub content: String,
    pub edited_at: i64,
}

impl MessageEdited {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.message_id);
        put_string(buf, &self.content);
        buf.put_i64(self.edited_at);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            message_id: get_u64(buf)?,
            content: get_string(buf)?,
            edited_at: get_i64(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MessageDeleted {
    pub message_id: u64,
    pub deleted_at: i64,
}

impl MessageDeleted {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.message_id);
        buf.put_i64(self.deleted_at);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            message_id: get_u64(buf)?,
            deleted_at: get_i64(buf)?,
        })
    }
}
