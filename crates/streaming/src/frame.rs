//! Wire framing (§6.1):
//!
//! ```text
//! [0]       uint8   MessageType
//! [1..4]    uint32  PayloadLength   (big-endian)
//! [5..5+L]  bytes   Payload
//! ```
//!
//! Every request and response on every connection is one frame; the protocol
//! is request/response per connection (pipelining is not required).

use crate::error::{Result, StreamingError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default cap on payload size (§6.2): oversize payloads must close the connection.
pub const DEFAULT_MAX_PAYLOAD_BYTES: u32 = 64 * 1024 * 1024;

/// A decoded but not-yet-interpreted frame.
pub struct RawFrame {
    pub message_type: u8,
    pub payload: Bytes,
}

/// Read one frame, enforcing `max_payload`. On any error the caller must close
/// the connection (§7).
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_payload: u32,
) -> Result<RawFrame> {
    let message_type = reader.read_u8().await?;
    let len = reader.read_u32().await?;
    if len > max_payload {
        return Err(StreamingError::OversizePayload {
            len,
            max: max_payload,
        });
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(RawFrame {
        message_type,
        payload: Bytes::from(buf),
    })
}

/// Write one frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message_type: u8,
    payload: &[u8],
) -> Result<()> {
    let mut header = BytesMut::with_capacity(5);
    header.put_u8(message_type);
    header.put_u32(payload.len() as u32);
    writer.write_all(&header).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// A cursor over a payload buffer used by `protocol::*` encode/decode pairs.
pub struct PayloadReader<'a> {
    buf: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn require(&self, n: usize) -> Result<()> {
        if self.buf.len() < n {
            return Err(StreamingError::Malformed(format!(
                "expected at least {n} more bytes, found {}",
                self.buf.len()
            )));
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.require(1)?;
        let v = self.buf[0];
        self.buf = &self.buf[1..];
        Ok(v)
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.require(4)?;
        let v = u32::from_be_bytes(self.buf[0..4].try_into().unwrap());
        self.buf = &self.buf[4..];
        Ok(v)
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.require(8)?;
        let v = u64::from_be_bytes(self.buf[0..8].try_into().unwrap());
        self.buf = &self.buf[8..];
        Ok(v)
    }

    /// Length-prefixed byte array (32-bit BE length, §6.1).
    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        self.require(len)?;
        let v = self.buf[..len].to_vec();
        self.buf = &self.buf[len..];
        Ok(v)
    }

    /// Length-prefixed UTF-8 string (§6.1).
    pub fn string(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.bytes()?)?)
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// A payload builder used by `protocol::*` encode functions.
#[derive(Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(&mut self, v: u8) -> &mut Self {
        self.buf.put_u8(v);
        self
    }

    pub fn put_u32(&mut self, v: u32) -> &mut Self {
        self.buf.put_u32(v);
        self
    }

    pub fn put_u64(&mut self, v: u64) -> &mut Self {
        self.buf.put_u64(v);
        self
    }

    pub fn put_bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.put_u32(v.len() as u32);
        self.buf.put_slice(v);
        self
    }

    pub fn put_string(&mut self, v: &str) -> &mut Self {
        self.put_bytes(v.as_bytes())
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }

    /// Splice another writer's bytes in (used to embed a `ConfigPayload` inside `NotOwner`).
    pub fn put_raw(&mut self, v: &[u8]) -> &mut Self {
        self.buf.put_slice(v);
        self
    }
}

impl From<BytesMut> for PayloadWriter {
    fn from(buf: BytesMut) -> Self {
        Self { buf }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, 11, b"hello").await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let frame = read_frame(&mut cursor, DEFAULT_MAX_PAYLOAD_BYTES)
            .await
            .unwrap();
        assert_eq!(frame.message_type, 11);
        assert_eq!(&frame.payload[..], b"hello");
    }

    #[tokio::test]
    async fn rejects_oversize_payload() {
        let mut buf = Vec::new();
        write_frame(&mut buf, 11, b"hello").await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_frame(&mut cursor, 2).await.unwrap_err();
        assert!(matches!(err, StreamingError::OversizePayload { .. }));
    }

    #[test]
    fn payload_reader_writer_round_trip_string_and_bytes() {
        let mut w = PayloadWriter::new();
        w.put_string("hello").put_bytes(&[1, 2, 3]).put_u32(42);
        let bytes = w.into_vec();
        let mut r = PayloadReader::new(&bytes);
        assert_eq!(r.string().unwrap(), "hello");
        assert_eq!(r.bytes().unwrap(), vec![1, 2, 3]);
        assert_eq!(r.u32().unwrap(), 42);
        assert!(r.is_empty());
    }
}
