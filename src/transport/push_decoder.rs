//! Bridges a push-based byte source (SSH channel `data` callbacks, which
//! hand us chunks as they arrive rather than letting us read from an
//! `AsyncRead`) into the pull-based `Stream<Item = DecodedFrame>` the
//! gateway loop expects — by driving [`FrameCodec`] by hand instead of via
//! `tokio_util::codec::Framed`.

use std::pin::Pin;
use std::task::{Context as TaskCx, Poll};

use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::codec::Decoder;

use crate::protocol::codec::{DecodedFrame, FrameCodecError};
use crate::protocol::FrameCodec;

pub struct PushDecoder {
    codec: FrameCodec,
    buf: BytesMut,
    rx: mpsc::Receiver<Bytes>,
}

impl PushDecoder {
    pub fn new(codec: FrameCodec, rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            codec,
            buf: BytesMut::new(),
            rx,
        }
    }
}

impl Stream for PushDecoder {
    type Item = Result<DecodedFrame, FrameCodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskCx<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.codec.decode(&mut this.buf) {
                Ok(Some(frame)) => return Poll::Ready(Some(Ok(frame))),
                Err(e) => return Poll::Ready(Some(Err(e))),
                Ok(None) => {}
            }
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(bytes)) => this.buf.extend_from_slice(&bytes),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
