//! Byte-order-aware primitive stream: `ByteReader` over any [`std::io::Read`]
//! source and `ByteWriter` over a growable buffer.
//!
//! Both sides expose fixed-width (1/2/4/8-byte) integer and float operations,
//! arbitrary-width ("X") integers of 1-8 bytes, raw byte runs, and an ambient
//! byte order the codec scopes per-field overrides around. End of stream is
//! reported as [`StreamError::Eof`] only when a read starts exactly at the end
//! of input; running dry mid-value is [`StreamError::UnexpectedEof`].

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io::{ErrorKind, Read};

/// Byte order for multi-byte primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Clean end of stream: a read began with no bytes left. The designed
    /// termination signal for open-ended repeated reads.
    #[error("end of stream")]
    Eof,
    /// The stream ran dry partway through a value.
    #[error("unexpected end of stream mid-value")]
    UnexpectedEof,
    #[error("integer width {0} out of range (1-8 bytes)")]
    Width(usize),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    pub fn is_eof(&self) -> bool {
        matches!(self, StreamError::Eof)
    }
}

/// Reader half of the primitive stream. Wraps any byte source; decode entry
/// points build one from a slice, long-lived streaming callers hand in files
/// or sockets.
pub struct ByteReader<'a> {
    src: Box<dyn Read + 'a>,
    order: Endianness,
    offset: u64,
    debug: bool,
}

impl<'a> ByteReader<'a> {
    pub fn new(src: impl Read + 'a, order: Endianness) -> Self {
        ByteReader {
            src: Box::new(src),
            order,
            offset: 0,
            debug: false,
        }
    }

    pub fn from_bytes(data: &'a [u8], order: Endianness) -> Self {
        Self::new(data, order)
    }

    /// If set, every primitive read prints its byte offset and raw bytes to
    /// stderr. Purely observational.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn order(&self) -> Endianness {
        self.order
    }

    /// Replace the ambient byte order, returning the previous one. The codec
    /// uses this to scope per-field overrides.
    pub fn swap_order(&mut self, order: Endianness) -> Endianness {
        std::mem::replace(&mut self.order, order)
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), StreamError> {
        if buf.is_empty() {
            return Ok(());
        }
        let start = self.offset;
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.src.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Err(StreamError::Eof),
                Ok(0) => return Err(StreamError::UnexpectedEof),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(StreamError::Io(e)),
            }
        }
        self.offset += buf.len() as u64;
        if self.debug {
            eprintln!("binshape: read  @{:#08x} {:02x?}", start, buf);
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8, StreamError> {
        self.read_u8()
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, StreamError> {
        let mut buf = vec![0u8; n];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, StreamError> {
        let mut b = [0u8; 1];
        self.fill(&mut b)?;
        Ok(b[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, StreamError> {
        let mut b = [0u8; 2];
        self.fill(&mut b)?;
        Ok(match self.order {
            Endianness::Big => BigEndian::read_u16(&b),
            Endianness::Little => LittleEndian::read_u16(&b),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32, StreamError> {
        let mut b = [0u8; 4];
        self.fill(&mut b)?;
        Ok(match self.order {
            Endianness::Big => BigEndian::read_u32(&b),
            Endianness::Little => LittleEndian::read_u32(&b),
        })
    }

    pub fn read_u64(&mut self) -> Result<u64, StreamError> {
        let mut b = [0u8; 8];
        self.fill(&mut b)?;
        Ok(match self.order {
            Endianness::Big => BigEndian::read_u64(&b),
            Endianness::Little => LittleEndian::read_u64(&b),
        })
    }

    pub fn read_i8(&mut self) -> Result<i8, StreamError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16, StreamError> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_i32(&mut self) -> Result<i32, StreamError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i64(&mut self) -> Result<i64, StreamError> {
        Ok(self.read_u64()? as i64)
    }

    /// Unsigned integer of an explicit width of `x` bytes, zero-extended.
    pub fn read_uint_x(&mut self, x: usize) -> Result<u64, StreamError> {
        if x == 0 || x > 8 {
            return Err(StreamError::Width(x));
        }
        let mut b = [0u8; 8];
        self.fill(&mut b[..x])?;
        Ok(match self.order {
            Endianness::Big => BigEndian::read_uint(&b[..x], x),
            Endianness::Little => LittleEndian::read_uint(&b[..x], x),
        })
    }

    /// Signed integer of an explicit width of `x` bytes, sign-extended.
    pub fn read_int_x(&mut self, x: usize) -> Result<i64, StreamError> {
        if x == 0 || x > 8 {
            return Err(StreamError::Width(x));
        }
        let mut b = [0u8; 8];
        self.fill(&mut b[..x])?;
        Ok(match self.order {
            Endianness::Big => BigEndian::read_int(&b[..x], x),
            Endianness::Little => LittleEndian::read_int(&b[..x], x),
        })
    }

    pub fn read_f32(&mut self) -> Result<f32, StreamError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, StreamError> {
        Ok(f64::from_bits(self.read_u64()?))
    }
}

/// Writer half of the primitive stream. Buffer-backed; encode entry points
/// hand the finished buffer out with [`ByteWriter::into_bytes`].
pub struct ByteWriter {
    buf: Vec<u8>,
    order: Endianness,
    debug: bool,
}

impl ByteWriter {
    pub fn new(order: Endianness) -> Self {
        ByteWriter {
            buf: Vec::with_capacity(1024),
            order,
            debug: false,
        }
    }

    /// If set, every primitive write prints its byte offset and raw bytes to
    /// stderr. Purely observational.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn order(&self) -> Endianness {
        self.order
    }

    pub fn swap_order(&mut self, order: Endianness) -> Endianness {
        std::mem::replace(&mut self.order, order)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn push(&mut self, bytes: &[u8]) {
        if self.debug {
            eprintln!("binshape: write @{:#08x} {:02x?}", self.buf.len(), bytes);
        }
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_byte(&mut self, b: u8) -> Result<(), StreamError> {
        self.push(&[b]);
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        self.push(bytes);
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<(), StreamError> {
        self.push(&[v]);
        Ok(())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<(), StreamError> {
        let mut b = [0u8; 2];
        match self.order {
            Endianness::Big => BigEndian::write_u16(&mut b, v),
            Endianness::Little => LittleEndian::write_u16(&mut b, v),
        }
        self.push(&b);
        Ok(())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<(), StreamError> {
        let mut b = [0u8; 4];
        match self.order {
            Endianness::Big => BigEndian::write_u32(&mut b, v),
            Endianness::Little => LittleEndian::write_u32(&mut b, v),
        }
        self.push(&b);
        Ok(())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<(), StreamError> {
        let mut b = [0u8; 8];
        match self.order {
            Endianness::Big => BigEndian::write_u64(&mut b, v),
            Endianness::Little => LittleEndian::write_u64(&mut b, v),
        }
        self.push(&b);
        Ok(())
    }

    pub fn write_i8(&mut self, v: i8) -> Result<(), StreamError> {
        self.write_u8(v as u8)
    }

    pub fn write_i16(&mut self, v: i16) -> Result<(), StreamError> {
        self.write_u16(v as u16)
    }

    pub fn write_i32(&mut self, v: i32) -> Result<(), StreamError> {
        self.write_u32(v as u32)
    }

    pub fn write_i64(&mut self, v: i64) -> Result<(), StreamError> {
        self.write_u64(v as u64)
    }

    /// Unsigned integer of an explicit width of `x` bytes; high bytes beyond
    /// the width are dropped.
    pub fn write_uint_x(&mut self, v: u64, x: usize) -> Result<(), StreamError> {
        if x == 0 || x > 8 {
            return Err(StreamError::Width(x));
        }
        let v = if x == 8 { v } else { v & ((1u64 << (8 * x)) - 1) };
        let mut b = [0u8; 8];
        match self.order {
            Endianness::Big => BigEndian::write_uint(&mut b[..x], v, x),
            Endianness::Little => LittleEndian::write_uint(&mut b[..x], v, x),
        }
        self.push(&b[..x]);
        Ok(())
    }

    /// Signed integer of an explicit width of `x` bytes, truncated to fit.
    pub fn write_int_x(&mut self, v: i64, x: usize) -> Result<(), StreamError> {
        self.write_uint_x(v as u64, x)
    }

    pub fn write_f32(&mut self, v: f32) -> Result<(), StreamError> {
        self.write_u32(v.to_bits())
    }

    pub fn write_f64(&mut self, v: f64) -> Result<(), StreamError> {
        self.write_u64(v.to_bits())
    }
}
