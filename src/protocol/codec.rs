//! Low-level wire primitives: [`ByteReader`] (§4.1) and [`ByteWriter`] (§4.2).
//!
//! PostgreSQL uses big-endian (network byte order) for all integers and
//! UTF-8 for all strings. Both types are grounded in the free-function
//! `read_*`/`write_*` helpers and `MessageBuilder` of the crate this was
//! adapted from, restructured as the cursor/buffer pair the spec names.

use zerocopy::byteorder::big_endian::{I16 as I16BE, I32 as I32BE, U16 as U16BE, U32 as U32BE};
use zerocopy::FromBytes;

use crate::error::{Error, Result};

/// A cursor over a borrowed byte slice, decoding big-endian primitives.
///
/// `ByteReader` never copies; `string`/`bytes` borrow directly from the
/// underlying slice, so returned values are valid for the slice's lifetime.
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    /// Wrap a byte slice for cursor-based reading.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Bytes remaining after the cursor.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.offset
    }

    fn require(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(Error::protocol(format!(
                "buffer underrun: need {n} bytes, have {}",
                self.remaining()
            )));
        }
        Ok(())
    }

    /// Read one byte.
    pub fn byte(&mut self) -> Result<u8> {
        self.require(1)?;
        let b = self.data[self.offset];
        self.offset += 1;
        Ok(b)
    }

    /// Read a big-endian `i16`.
    pub fn int16(&mut self) -> Result<i16> {
        self.require(2)?;
        let v = I16BE::ref_from_bytes(&self.data[self.offset..self.offset + 2])?.get();
        self.offset += 2;
        Ok(v)
    }

    /// Read a big-endian `u16`.
    pub fn uint16(&mut self) -> Result<u16> {
        self.require(2)?;
        let v = U16BE::ref_from_bytes(&self.data[self.offset..self.offset + 2])?.get();
        self.offset += 2;
        Ok(v)
    }

    /// Read a big-endian `i32`.
    pub fn int32(&mut self) -> Result<i32> {
        self.require(4)?;
        let v = I32BE::ref_from_bytes(&self.data[self.offset..self.offset + 4])?.get();
        self.offset += 4;
        Ok(v)
    }

    /// Read a big-endian `u32`.
    pub fn uint32(&mut self) -> Result<u32> {
        self.require(4)?;
        let v = U32BE::ref_from_bytes(&self.data[self.offset..self.offset + 4])?.get();
        self.offset += 4;
        Ok(v)
    }

    /// Return a borrowed sub-slice of exactly `len` bytes, advancing the cursor.
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.require(len)?;
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// Read exactly `len` bytes and interpret them as UTF-8.
    pub fn string(&mut self, len: usize) -> Result<&'a str> {
        let bytes = self.bytes(len)?;
        simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::protocol(format!("invalid UTF-8 in string({len}): {e}")))
    }

    /// Read bytes up to and past the next NUL terminator, returning the
    /// preceding bytes decoded as UTF-8 (without the terminator).
    pub fn cstring(&mut self) -> Result<&'a str> {
        let rest = &self.data[self.offset..];
        let nul = memchr::memchr(0, rest)
            .ok_or_else(|| Error::protocol("cstring: no NUL terminator found"))?;
        let s = simdutf8::compat::from_utf8(&rest[..nul])
            .map_err(|e| Error::protocol(format!("invalid UTF-8 in cstring: {e}")))?;
        self.offset += nul + 1;
        Ok(s)
    }
}

/// A growable buffer that accumulates a message body and, on [`Self::flush`],
/// emits a complete `[code][length][body]` (or unframed startup) frame.
///
/// The writer resets to empty after each `flush`/`flush_unframed`, matching
/// §4.2's "The writer resets on flush."
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// A new, empty writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append a single byte.
    pub fn byte(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    /// Append a big-endian `i16`.
    pub fn int16(&mut self, value: i16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append a big-endian `u16`.
    pub fn uint16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append a big-endian `i32`.
    pub fn int32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append a big-endian `u32`.
    pub fn uint32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append raw bytes verbatim.
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Append a fixed-length string with no terminator.
    pub fn string(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Append a NUL-terminated string.
    pub fn cstring(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        self
    }

    /// Finish the accumulated body into a complete framed message: one code
    /// byte, a 4-byte BE length (body length + 4), then the body. Resets the
    /// writer.
    pub fn flush(&mut self, code: u8) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.buf.len() + 5);
        out.push(code);
        out.extend_from_slice(&((self.buf.len() + 4) as u32).to_be_bytes());
        out.extend_from_slice(&self.buf);
        self.buf.clear();
        out
    }

    /// Finish the accumulated body as an unframed startup-style message:
    /// a 4-byte BE length (including itself), then the body. Resets the
    /// writer. Used for the startup packet and `CancelRequest`/`SSLRequest`.
    pub fn flush_unframed(&mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.buf.len() + 4);
        out.extend_from_slice(&((self.buf.len() + 4) as u32).to_be_bytes());
        out.extend_from_slice(&self.buf);
        self.buf.clear();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_roundtrips_primitives() {
        let mut w = ByteWriter::new();
        w.int16(-7).uint16(7).int32(-70000).uint32(70000).cstring("hi");
        let body = w.bytes(&[]).flush_unframed();
        let mut r = ByteReader::new(&body[4..]);
        assert_eq!(r.int16().unwrap(), -7);
        assert_eq!(r.uint16().unwrap(), 7);
        assert_eq!(r.int32().unwrap(), -70000);
        assert_eq!(r.uint32().unwrap(), 70000);
        assert_eq!(r.cstring().unwrap(), "hi");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn flush_produces_correct_length_header() {
        let mut w = ByteWriter::new();
        w.cstring("SELECT 1");
        let msg = w.flush(b'Q');
        assert_eq!(msg[0], b'Q');
        let len = u32::from_be_bytes([msg[1], msg[2], msg[3], msg[4]]);
        assert_eq!(len as usize, msg.len() - 1);
    }

    #[test]
    fn cstring_without_terminator_errors() {
        let data = b"no-terminator";
        let mut r = ByteReader::new(data);
        assert!(r.cstring().is_err());
    }

    #[test]
    fn writer_resets_after_flush() {
        let mut w = ByteWriter::new();
        w.byte(1);
        let _ = w.flush(b'X');
        let second = w.flush(b'Y');
        assert_eq!(second.len(), 5);
    }
}
