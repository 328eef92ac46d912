//! Cursor-style reader and growable writer shared by every codec in the crate.
//!
//! Reads are little-endian and bounds-checked: running off the end is a
//! [`FormatError::UnexpectedEof`] carrying the absolute offset, never a panic.

use byteorder::{ByteOrder, LittleEndian};

use crate::config::Layout;
use crate::error::{FormatError, ParseResultExt, Result};

/// Implemented by every model type that can be written back.
///
/// `calculate_size` must equal the number of bytes `write` appends, for every value.
pub trait Element {
    fn write(&self, w: &mut SaveWriter);

    fn calculate_size(&self, layout: &Layout) -> usize;
}

impl<T: Element> Element for Vec<T> {
    fn write(&self, w: &mut SaveWriter) {
        for item in self {
            item.write(w);
        }
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        self.iter().map(|e| e.calculate_size(layout)).sum()
    }
}

impl<T: Element> Element for Option<T> {
    fn write(&self, w: &mut SaveWriter) {
        if let Some(v) = self {
            v.write(w);
        }
    }

    fn calculate_size(&self, layout: &Layout) -> usize {
        self.as_ref().map_or(0, |v| v.calculate_size(layout))
    }
}

#[derive(Clone, Debug)]
pub struct SaveReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Absolute offset of `data[0]`, so sub-readers report file positions.
    base: usize,
    layout: Layout,
}

impl<'a> SaveReader<'a> {
    pub fn new(data: &'a [u8], layout: Layout) -> Self {
        Self { data, pos: 0, base: 0, layout }
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Absolute position of the cursor.
    #[inline]
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn ensure(&self, need: usize) -> std::result::Result<(), FormatError> {
        if need > self.remaining() {
            return Err(FormatError::UnexpectedEof {
                offset: self.position(),
                need,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> std::result::Result<&'a [u8], FormatError> {
        self.ensure(n)?;
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> std::result::Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn peek_u8(&self) -> std::result::Result<u8, FormatError> {
        self.ensure(1)?;
        Ok(self.data[self.pos])
    }

    pub fn read_u8(&mut self) -> std::result::Result<u8, FormatError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> std::result::Result<u16, FormatError> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_i16(&mut self) -> std::result::Result<i16, FormatError> {
        Ok(LittleEndian::read_i16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> std::result::Result<u32, FormatError> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_i32(&mut self) -> std::result::Result<i32, FormatError> {
        Ok(LittleEndian::read_i32(self.read_bytes(4)?))
    }

    pub fn read_u64(&mut self) -> std::result::Result<u64, FormatError> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }

    pub fn read_f32(&mut self) -> std::result::Result<f32, FormatError> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    /// Reads an unsigned 16-bit count and rejects values above `max`.
    pub fn read_count_u16(&mut self, what: &'static str, max: u16) -> std::result::Result<usize, FormatError> {
        let offset = self.position();
        let n = self.read_u16()?;
        if n > max {
            return Err(FormatError::OutOfRange { what, value: n as i64, min: 0, max: max as i64, offset });
        }
        Ok(n as usize)
    }

    /// Reads a signed 32-bit count and rejects values outside `min..=max`.
    pub fn read_count_i32(&mut self, what: &'static str, min: i32, max: i32) -> std::result::Result<usize, FormatError> {
        let offset = self.position();
        let n = self.read_i32()?;
        if n < min || n > max {
            return Err(FormatError::OutOfRange {
                what,
                value: n as i64,
                min: min as i64,
                max: max as i64,
                offset,
            });
        }
        Ok(n as usize)
    }

    /// Unsigned 32-bit count, bounded only by the bytes left (each item needs at least `min_item` bytes).
    pub fn read_count_u32(&mut self, what: &'static str, min_item: usize) -> std::result::Result<usize, FormatError> {
        let offset = self.position();
        let n = self.read_u32()? as usize;
        let max = self.remaining() / min_item.max(1);
        if n > max {
            return Err(FormatError::OutOfRange { what, value: n as i64, min: 0, max: max as i64, offset });
        }
        Ok(n)
    }

    /// Bytes up to (not including) a NUL terminator; the terminator is consumed.
    pub fn read_zstring(&mut self) -> std::result::Result<&'a [u8], FormatError> {
        let rest = &self.data[self.pos..];
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                self.pos += end + 1;
                Ok(&rest[..end])
            }
            None => Err(FormatError::UnexpectedEof { offset: self.position() + rest.len(), need: 1, remaining: 0 }),
        }
    }

    /// A `u16` length followed by that many bytes.
    pub fn read_wstring(&mut self) -> std::result::Result<&'a [u8], FormatError> {
        let len = self.read_u16()? as usize;
        self.read_bytes(len)
    }

    /// Splits off the next `n` bytes as an independent reader; this reader skips past them.
    pub fn take(&mut self, n: usize) -> std::result::Result<SaveReader<'a>, FormatError> {
        let base = self.position();
        let data = self.read_bytes(n)?;
        Ok(SaveReader { data, pos: 0, base, layout: self.layout })
    }

    /// Reader over a buffer that is not part of the file (an inflated body),
    /// keeping this reader's layout.
    pub fn detached<'b>(&self, data: &'b [u8]) -> SaveReader<'b> {
        SaveReader { data, pos: 0, base: 0, layout: self.layout }
    }

    /// Fails unless every byte has been consumed.
    pub fn expect_end(&self, what: &'static str) -> std::result::Result<(), FormatError> {
        if !self.is_empty() {
            return Err(FormatError::SizeMismatch {
                what,
                declared: self.pos,
                actual: self.data.len(),
                offset: self.position(),
            });
        }
        Ok(())
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }
}

/// Reads `count` items, wrapping any failure with the element name and its position in the list.
pub fn read_list<'a, T, F>(r: &mut SaveReader<'a>, count: usize, element: &'static str, mut f: F) -> Result<Vec<T>>
where
    F: FnMut(&mut SaveReader<'a>) -> Result<T>,
{
    let mut out = Vec::with_capacity(count.min(4096));
    for index in 0..count {
        let item = f(r).element(element).list_item(index, count)?;
        out.push(item);
    }
    Ok(out)
}

/// Little-endian output buffer.
///
/// Writing is infallible per value; a length that cannot be encoded is recorded
/// with [`SaveWriter::reject`] and surfaces from [`SaveWriter::finish`].
#[derive(Clone, Debug)]
pub struct SaveWriter {
    buf: Vec<u8>,
    layout: Layout,
    error: Option<FormatError>,
}

impl SaveWriter {
    pub fn new(layout: Layout) -> Self {
        Self { buf: Vec::new(), layout, error: None }
    }

    pub fn with_capacity(layout: Layout, capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity), layout, error: None }
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Records a write that could not be encoded. Only the first one is kept.
    pub fn reject(&mut self, err: FormatError) {
        if self.error.is_none() {
            tracing::warn!(offset = self.buf.len(), "write rejected: {err}");
            self.error = Some(err);
        }
    }

    /// The written bytes, or the first rejected write.
    pub fn finish(self) -> std::result::Result<Vec<u8>, FormatError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.buf),
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        let mut b = [0; 2];
        LittleEndian::write_u16(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_i16(&mut self, v: i16) {
        let mut b = [0; 2];
        LittleEndian::write_i16(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_u32(&mut self, v: u32) {
        let mut b = [0; 4];
        LittleEndian::write_u32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_i32(&mut self, v: i32) {
        let mut b = [0; 4];
        LittleEndian::write_i32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_u64(&mut self, v: u64) {
        let mut b = [0; 8];
        LittleEndian::write_u64(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_f32(&mut self, v: f32) {
        let mut b = [0; 4];
        LittleEndian::write_f32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_zstring(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.buf.push(0);
    }

    /// Writes a `u8` count; counts that do not fit are rejected.
    pub fn write_count_u8(&mut self, what: &'static str, n: usize) {
        match u8::try_from(n) {
            Ok(v) => self.write_u8(v),
            Err(_) => self.reject_count(what, n, u8::MAX as usize),
        }
    }

    /// Writes a `u16` count; counts that do not fit are rejected.
    pub fn write_count_u16(&mut self, what: &'static str, n: usize) {
        match u16::try_from(n) {
            Ok(v) => self.write_u16(v),
            Err(_) => self.reject_count(what, n, u16::MAX as usize),
        }
    }

    /// Writes a `u16` length prefix and the bytes. Longer input is rejected and
    /// nothing is written.
    pub fn write_wstring(&mut self, bytes: &[u8]) {
        match u16::try_from(bytes.len()) {
            Ok(len) => {
                self.write_u16(len);
                self.buf.extend_from_slice(bytes);
            }
            Err(_) => self.reject_count("string length", bytes.len(), u16::MAX as usize),
        }
    }

    fn reject_count(&mut self, what: &'static str, n: usize, max: usize) {
        let offset = self.buf.len();
        self.reject(FormatError::OutOfRange { what, value: n as i64, min: 0, max: max as i64, offset });
    }
}

/// Serializes any element into a fresh buffer.
pub fn to_bytes<E: Element + ?Sized>(element: &E, layout: Layout) -> std::result::Result<Vec<u8>, FormatError> {
    let mut w = SaveWriter::with_capacity(layout, element.calculate_size(&layout));
    element.write(&mut w);
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_reports_absolute_offset_in_sub_reader() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let mut r = SaveReader::new(&data, Layout::default());
        r.read_u16().unwrap();
        let mut sub = r.take(3).unwrap();
        assert_eq!(sub.read_u16().unwrap(), u16::from_le_bytes([3, 4]));
        let err = sub.read_u16().unwrap_err();
        assert_eq!(err, FormatError::UnexpectedEof { offset: 4, need: 2, remaining: 1 });
        assert_eq!(r.position(), 5);
    }

    #[test]
    fn bounded_counts() {
        let data = 3000u16.to_le_bytes();
        let mut r = SaveReader::new(&data, Layout::default());
        let err = r.read_count_u16("parameter count", 2047).unwrap_err();
        assert!(matches!(err, FormatError::OutOfRange { value: 3000, max: 2047, .. }));
    }

    #[test]
    fn zstring_and_wstring() {
        let data = [b'a', b'b', 0, 2, 0, b'c', b'd'];
        let mut r = SaveReader::new(&data, Layout::default());
        assert_eq!(r.read_zstring().unwrap(), b"ab");
        assert_eq!(r.read_wstring().unwrap(), b"cd");
        assert!(r.expect_end("test").is_ok());
    }

    #[test]
    fn writer_is_little_endian() {
        let mut w = SaveWriter::new(Layout::default());
        w.write_u16(0x0102);
        w.write_i16(-2);
        w.write_u32(0x0304_0506);
        w.write_f32(1.0);
        w.write_u64(7);
        assert_eq!(hex::encode(w.finish().unwrap()), "0201feff060504030000803f0700000000000000");
    }

    #[test]
    fn oversized_wstring_is_rejected() {
        let mut w = SaveWriter::new(Layout::default());
        w.write_wstring(b"ok");
        w.write_wstring(&vec![b'x'; u16::MAX as usize + 1]);
        w.write_wstring(b"after");
        assert_eq!(w.len(), 4 + 7);
        let err = w.finish().unwrap_err();
        assert_eq!(
            err,
            FormatError::OutOfRange { what: "string length", value: 65536, min: 0, max: 65535, offset: 4 }
        );

        let mut w = SaveWriter::new(Layout::default());
        w.write_wstring(&vec![b'y'; u16::MAX as usize]);
        assert_eq!(w.finish().unwrap().len(), 2 + u16::MAX as usize);
    }

    #[test]
    fn read_list_wraps_failures() {
        let data = [1u8, 2, 3];
        let mut r = SaveReader::new(&data, Layout::default());
        let err = read_list(&mut r, 2, "pair", |r| Ok(r.read_u16()?)).unwrap_err();
        assert_eq!(err.path(), "[1/2] > pair > unexpected end of data at 0x2: need 2 bytes, 1 left");
    }
}
