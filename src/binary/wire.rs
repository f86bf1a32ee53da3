//! Big-endian wire primitives with byte-offset tracking
//!
//! Strings and byte arrays are a u32 length followed by the raw bytes,
//! without padding.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{FnfError, Result};

/// Sanity bound on any length prefix read from the wire (64 MiB).
pub const MAX_LENGTH: usize = 64 * 1024 * 1024;

/// Reader half: counts consumed bytes so errors can report an offset
pub struct WireReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> Read for WireReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

impl<R: Read> WireReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.read_u8()?)
    }

    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.read_i8()?)
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(self.read_u16::<BigEndian>()?)
    }

    pub fn i16(&mut self) -> Result<i16> {
        Ok(self.read_i16::<BigEndian>()?)
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(self.read_u32::<BigEndian>()?)
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(self.read_i32::<BigEndian>()?)
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(self.read_u64::<BigEndian>()?)
    }

    pub fn i64(&mut self) -> Result<i64> {
        Ok(self.read_i64::<BigEndian>()?)
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(self.read_f32::<BigEndian>()?)
    }

    pub fn f64(&mut self) -> Result<f64> {
        Ok(self.read_f64::<BigEndian>()?)
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(FnfError::InvalidValue {
                expected: "boolean".to_string(),
                text: other.to_string(),
            }),
        }
    }

    /// Length or count prefix, bounded by [`MAX_LENGTH`]
    pub fn len(&mut self) -> Result<usize> {
        let len = self.u32()? as usize;
        if len > MAX_LENGTH {
            return Err(FnfError::ResourceExhausted {
                requested: len,
                limit: MAX_LENGTH,
            });
        }
        Ok(len)
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.len()?;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn string(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.bytes()?)?)
    }

    pub fn fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Writer half
pub struct WireWriter<W> {
    inner: W,
    offset: u64,
}

impl<W: Write> Write for WireWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.offset += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> WireWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, offset: 0 }
    }

    /// Bytes written so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn put_u8(&mut self, v: u8) -> Result<()> {
        Ok(self.write_u8(v)?)
    }

    pub fn put_i8(&mut self, v: i8) -> Result<()> {
        Ok(self.write_i8(v)?)
    }

    pub fn put_u16(&mut self, v: u16) -> Result<()> {
        Ok(self.write_u16::<BigEndian>(v)?)
    }

    pub fn put_i16(&mut self, v: i16) -> Result<()> {
        Ok(self.write_i16::<BigEndian>(v)?)
    }

    pub fn put_u32(&mut self, v: u32) -> Result<()> {
        Ok(self.write_u32::<BigEndian>(v)?)
    }

    pub fn put_i32(&mut self, v: i32) -> Result<()> {
        Ok(self.write_i32::<BigEndian>(v)?)
    }

    pub fn put_u64(&mut self, v: u64) -> Result<()> {
        Ok(self.write_u64::<BigEndian>(v)?)
    }

    pub fn put_i64(&mut self, v: i64) -> Result<()> {
        Ok(self.write_i64::<BigEndian>(v)?)
    }

    pub fn put_f32(&mut self, v: f32) -> Result<()> {
        Ok(self.write_f32::<BigEndian>(v)?)
    }

    pub fn put_f64(&mut self, v: f64) -> Result<()> {
        Ok(self.write_f64::<BigEndian>(v)?)
    }

    pub fn put_bool(&mut self, v: bool) -> Result<()> {
        self.put_u8(u8::from(v))
    }

    pub fn put_len(&mut self, len: usize) -> Result<()> {
        if len > MAX_LENGTH {
            return Err(FnfError::ResourceExhausted {
                requested: len,
                limit: MAX_LENGTH,
            });
        }
        self.put_u32(len as u32)
    }

    pub fn put_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.put_len(v.len())?;
        Ok(self.write_all(v)?)
    }

    pub fn put_string(&mut self, v: &str) -> Result<()> {
        self.put_bytes(v.as_bytes())
    }

    pub fn put_fixed(&mut self, v: &[u8]) -> Result<()> {
        Ok(self.write_all(v)?)
    }
}
