use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{encode_frame, CanFrame};
use crate::error::FrameError;
use crate::scanner::scan_frame;

/// GridConnect codec for `tokio_util::codec::Framed` streams.
///
/// Malformed frames are logged and skipped rather than surfaced, so one bad
/// frame on a shared bus does not end the stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct GridConnectCodec;

impl GridConnectCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for GridConnectCodec {
    type Item = CanFrame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match scan_frame(src) {
                Some(Ok(frame)) => return Ok(Some(frame)),
                Some(Err(err)) => warn!(error = %err, "skipping malformed frame"),
                None => return Ok(None),
            }
        }
    }
}

impl Encoder<CanFrame> for GridConnectCodec {
    type Error = FrameError;

    fn encode(&mut self, item: CanFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst);
        Ok(())
    }
}

impl Encoder<&CanFrame> for GridConnectCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &CanFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(item, dst);
        Ok(())
    }
}
