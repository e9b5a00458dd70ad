use crate::network::message::WireMessage;
use crate::utils::{BallotError, Result};
use bytes::{Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Upper bound for one frame; a block with a 4096-bit key is a few KiB.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Length-delimited JSON frames carrying `WireMessage`s.
///
/// A frame that is not valid JSON is yielded as `Err` instead of failing the
/// stream, so one malformed message cannot drop the whole connection.
#[derive(Debug)]
pub struct JsonCodec {
    inner: LengthDelimitedCodec,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self {
            inner: LengthDelimitedCodec::builder().max_frame_length(MAX_FRAME_LEN).new_codec(),
        }
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for JsonCodec {
    type Item = Result<WireMessage>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> std::result::Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(frame) => Ok(Some(serde_json::from_slice(&frame).map_err(BallotError::from))),
            None => Ok(None),
        }
    }
}

impl Encoder<WireMessage> for JsonCodec {
    type Error = io::Error;

    fn encode(&mut self, item: WireMessage, dst: &mut BytesMut) -> std::result::Result<(), Self::Error> {
        let bin = serde_json::to_vec(&item).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.inner.encode(Bytes::from(bin), dst)
    }
}
