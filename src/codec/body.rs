//! Cursor-style helpers for the binary body layouts.
//!
//! All multi-byte integers on the wire are big-endian. Variable-length
//! fields are length-prefixed; the prefix width (u16 or u32) is part of
//! each command's documented layout.

use super::CodecError;

/// Read cursor over a body slice.
pub struct BodyReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    /// Wraps a body slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether the cursor has reached the end.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consumes `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::TruncatedBody {
                needed: len - self.remaining(),
                offset: self.pos,
            });
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    /// Consumes everything left.
    pub fn take_rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32(&mut self) -> Result<i32, CodecError> {
        Ok(self.u32()? as i32)
    }

    pub fn i64(&mut self) -> Result<i64, CodecError> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(i64::from_be_bytes(buf))
    }

    /// Consumes a u16-length-prefixed byte string.
    pub fn bytes_u16(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.u16()? as usize;
        self.take(len)
    }

    /// Consumes a u32-length-prefixed byte string.
    pub fn bytes_u32(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    /// Consumes a u16-length-prefixed UTF-8 string.
    pub fn string_u16(&mut self) -> Result<String, CodecError> {
        let offset = self.pos;
        let raw = self.bytes_u16()?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidHeader(format!(
            "invalid UTF-8 string at offset {offset}"
        )))
    }
}

/// Write cursor producing a body buffer.
#[derive(Default)]
pub struct BodyWriter {
    buf: Vec<u8>,
}

impl BodyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finishes the body and hands over the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn i64(&mut self, v: i64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn raw(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }

    /// Writes a u16-length-prefixed byte string. Lengths above
    /// `u16::MAX` are truncated by the caller's layout contract, so this
    /// asserts in debug builds only.
    pub fn bytes_u16(&mut self, v: &[u8]) -> &mut Self {
        debug_assert!(v.len() <= u16::MAX as usize);
        self.u16(v.len() as u16);
        self.raw(v)
    }

    /// Writes a u32-length-prefixed byte string.
    pub fn bytes_u32(&mut self, v: &[u8]) -> &mut Self {
        self.u32(v.len() as u32);
        self.raw(v)
    }

    /// Writes a u16-length-prefixed UTF-8 string.
    pub fn string_u16(&mut self, v: &str) -> &mut Self {
        self.bytes_u16(v.as_bytes())
    }
}
