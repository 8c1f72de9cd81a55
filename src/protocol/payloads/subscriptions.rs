use bytes::{Buf, BufMut};

use crate::protocol::wire::*;

#[derive(Debug, Clone, Copy)]
pub struct SubscribeThread {
    pub thread_id: u64,
}

impl SubscribeThread {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.thread_id);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            thread_id: get_u64(buf)?,
        })
    }
}

pub type UnsubscribeThread = SubscribeThread;

#[derive(Debug, Clone, Copy)]
pub struct SubscribeChannel {
    pub channel_id: u64,
    pub subchannel_id: Option<u64>,
}

impl SubscribeChannel {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.channel_id);
        put_optional_u64(buf, self.subchannel_id);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            channel_id: get_u64(buf)?,
            subchannel_id: get_optional_u64(buf)?,
        })
    }
}

pub type UnsubscribeChannel = SubscribeChannel;

#[derive(Debug, Clone)]
pub struct SubscribeOk {
    pub success: bool,
    pub message: String,
}

impl SubscribeOk {
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
