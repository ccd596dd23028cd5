//! Length-prefixed wire format.
//!
//! ## Wire format
//!
//! ```text
//! repeat:
//!   length:  u32 big-endian (byte count of payload)
//!   payload: [u8; length]   (JPEG image)
//! ```
//!
//! There is no handshake, heartbeat or end-of-stream marker. The
//! sender closing the connection ends the stream.
//!
//! [`FrameCodec`] implements both halves for `tokio_util::codec`, so a
//! listener can wrap its socket in `FramedRead`. The transmitter does
//! not use `FramedWrite`: it needs the exact byte count of each write,
//! which [`write_message`] reports.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;

/// Size of the length prefix.
pub const PREFIX_LEN: usize = 4;

/// Largest payload the decoder accepts (64 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

// ── WireMessage ──────────────────────────────────────────────────

/// One length-prefixed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    payload: Bytes,
}

impl WireMessage {
    /// Wraps `payload`, rejecting sizes a `u32` prefix cannot describe.
    pub fn new(payload: impl Into<Bytes>) -> Result<Self, CodecError> {
        let payload = payload.into();
        if u32::try_from(payload.len()).is_err() {
            return Err(CodecError::PayloadTooLarge {
                size: payload.len(),
            });
        }
        Ok(Self { payload })
    }

    /// Value of the length prefix.
    pub fn length(&self) -> u32 {
        self.payload.len() as u32
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Bytes this message occupies on the wire.
    pub fn wire_len(&self) -> usize {
        PREFIX_LEN + self.payload.len()
    }

    /// Prefix and payload in one contiguous buffer.
    pub fn to_bytes(&self) -> BytesMut {
        let mut dst = BytesMut::with_capacity(self.wire_len());
        dst.put_u32(self.length());
        dst.extend_from_slice(&self.payload);
        dst
    }
}

// ── FrameCodec ───────────────────────────────────────────────────

/// `tokio_util` codec for the length-prefixed stream.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_payload: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }

    /// Codec with a custom upper bound on decoded payloads.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self { max_payload }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < PREFIX_LEN {
            return Ok(None);
        }

        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if len > self.max_payload {
            return Err(CodecError::FrameTooLarge {
                size: len,
                max: self.max_payload,
            });
        }

        if src.len() < PREFIX_LEN + len {
            src.reserve(PREFIX_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(PREFIX_LEN);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<WireMessage> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: WireMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.wire_len());
        dst.put_u32(item.length());
        dst.extend_from_slice(item.payload());
        Ok(())
    }
}

// ── Writing ──────────────────────────────────────────────────────

/// Write `buf` to `writer` as one message and return the bytes accepted.
///
/// Keeps writing until the buffer is drained or the writer accepts zero
/// bytes. A return value smaller than `buf.len()` is a short write; the
/// remainder is never resumed.
pub async fn write_message<W>(writer: &mut W, buf: &[u8]) -> std::io::Result<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0;
    while written < buf.len() {
        let n = writer.write(&buf[written..]).await?;
        if n == 0 {
            break;
        }
        written += n;
    }
    writer.flush().await?;
    Ok(written)
}

// ── Tests ────────────────────────────────────────────────────────
