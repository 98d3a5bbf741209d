//! Big-endian binary reader/writer abstractions (§4.2).
//!
//! Two readers (a borrowed byte-slice cursor and a transport-backed reader)
//! and two writers (a growable `BytesMut` buffer and a transport-backed
//! writer) share the primitive operations below. The growable-buffer writer
//! follows the reserve-then-backpatch pattern the teacher's `MessageEncoder`
//! uses for fields whose value isn't known until more has been written.

use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};

pub trait ByteReader {
    fn read_u8(&mut self) -> Result<u8>;
    fn read_u16(&mut self) -> Result<u16>;
    fn read_u32(&mut self) -> Result<u32>;
    fn read_u64(&mut self) -> Result<u64>;
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;
    fn read_vec(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }
}

pub trait ByteWriter {
    fn write_u8(&mut self, value: u8) -> Result<()>;
    fn write_u16(&mut self, value: u16) -> Result<()>;
    fn write_u32(&mut self, value: u32) -> Result<()>;
    fn write_u64(&mut self, value: u64) -> Result<()>;
    fn write_bytes(&mut self, buf: &[u8]) -> Result<()>;

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)
    }

    fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_u8(value as u8)
    }

    fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_u16(value as u16)
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_u32(value as u32)
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_u64(value as u64)
    }

    fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_u32(value.to_bits())
    }

    fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_u64(value.to_bits())
    }
}

/// Cursor over a borrowed byte slice, used for decoding an already-received
/// packet buffer without copying it.
pub struct SliceReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn end_of_stream(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn peek_remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

impl<'a> ByteReader for SliceReader<'a> {
    fn read_u8(&mut self) -> Result<u8> {
        let mut out = [0u8; 1];
        self.read_exact(&mut out)?;
        Ok(out[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut out = [0u8; 2];
        self.read_exact(&mut out)?;
        Ok(u16::from_be_bytes(out))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut out = [0u8; 4];
        self.read_exact(&mut out)?;
        Ok(u32::from_be_bytes(out))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut out = [0u8; 8];
        self.read_exact(&mut out)?;
        Ok(u64::from_be_bytes(out))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.remaining() < buf.len() {
            return Err(Error::InvalidPacket);
        }

        buf.copy_from_slice(&self.buf[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }
}

/// Growable output buffer, analogous to the teacher's `MessageEncoder`.
#[derive(Default)]
pub struct BufWriter {
    inner: BytesMut,
}

/// A placeholder reserved inside a [`BufWriter`] for a value that is only
/// known after more bytes have been written (e.g. a packet's total size).
pub struct Mark(usize);

impl BufWriter {
    pub fn new() -> Self {
        Self { inner: BytesMut::new() }
    }

    pub fn num_bytes_written(&self) -> usize {
        self.inner.len()
    }

    pub fn get_bytes(&self) -> &[u8] {
        &self.inner
    }

    pub fn into_bytes(self) -> BytesMut {
        self.inner
    }

    /// Reserve `n` zero bytes and return a [`Mark`] to [`Self::backpatch`]
    /// later, mirroring the teacher's `advance_mut`-then-backfill idiom for
    /// length fields written before their value is known.
    pub fn reserve(&mut self, n: usize) -> Mark {
        let mark = self.inner.len();
        self.inner.resize(mark + n, 0);
        Mark(mark)
    }

    pub fn backpatch(&mut self, mark: Mark, bytes: &[u8]) {
        self.inner[mark.0..mark.0 + bytes.len()].copy_from_slice(bytes);
    }
}

impl ByteWriter for BufWriter {
    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.put_u8(value);
        Ok(())
    }

    fn write_u16(&mut self, value: u16) -> Result<()> {
        self.inner.put_u16(value);
        Ok(())
    }

    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.inner.put_u32(value);
        Ok(())
    }

    fn write_u64(&mut self, value: u64) -> Result<()> {
        self.inner.put_u64(value);
        Ok(())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.put_slice(buf);
        Ok(())
    }
}

/// Reader pulling primitives directly from a blocking, byte-oriented source.
pub struct TransportReader<R> {
    inner: R,
}

impl<R: Read> TransportReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

impl<R: Read> ByteReader for TransportReader<R> {
    fn read_u8(&mut self) -> Result<u8> {
        let mut out = [0u8; 1];
        self.read_exact(&mut out)?;
        Ok(out[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut out = [0u8; 2];
        self.read_exact(&mut out)?;
        Ok(u16::from_be_bytes(out))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut out = [0u8; 4];
        self.read_exact(&mut out)?;
        Ok(u32::from_be_bytes(out))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut out = [0u8; 8];
        self.read_exact(&mut out)?;
        Ok(u64::from_be_bytes(out))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::ConnectionClosed
            } else {
                Error::from(err)
            }
        })
    }
}

/// Writer pushing primitives directly onto a blocking, byte-oriented sink.
pub struct TransportWriter<W> {
    inner: W,
}

impl<W: Write> TransportWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

impl<W: Write> ByteWriter for TransportWriter<W> {
    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf).map_err(Error::from)
    }
}
