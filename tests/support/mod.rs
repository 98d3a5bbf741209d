//! An in-memory duplex transport standing in for a real socket, so
//! integration tests can drive the public API end-to-end without binding
//! a port.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use mqwire_core::error::{Error, Result};
use mqwire_core::io::{ByteReader, ByteWriter};
use mqwire_core::net::ip_address::IpAddress;
use mqwire_core::transport::{Timeout, Transport};

#[derive(Default)]
struct Inner {
    buf: Mutex<VecDeque<u8>>,
    closed: Mutex<bool>,
}

pub struct MemoryTransport {
    read_side: Arc<Inner>,
    write_side: Arc<Inner>,
}

impl MemoryTransport {
    /// Builds two ends of the same pipe: bytes written to one are read
    /// back from the other.
    pub fn pair() -> (MemoryTransport, MemoryTransport) {
        let a = Arc::new(Inner::default());
        let b = Arc::new(Inner::default());
        (
            MemoryTransport { read_side: a.clone(), write_side: b.clone() },
            MemoryTransport { read_side: b, write_side: a },
        )
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, buf: &mut [u8], _timeout: Timeout) -> Result<usize> {
        let mut queue = self.read_side.buf.lock().unwrap();
        if queue.is_empty() {
            return if *self.read_side.closed.lock().unwrap() { Err(Error::ConnectionClosed) } else { Err(Error::TimeoutExpired) };
        }
        let n = buf.len().min(queue.len());
        for slot in buf.iter_mut().take(n) {
            *slot = queue.pop_front().unwrap();
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8], _timeout: Timeout) -> Result<usize> {
        if *self.write_side.closed.lock().unwrap() {
            return Err(Error::ConnectionClosed);
        }
        self.write_side.buf.lock().unwrap().extend(buf.iter().copied());
        Ok(buf.len())
    }

    fn shutdown(&mut self) -> Result<()> {
        *self.read_side.closed.lock().unwrap() = true;
        *self.write_side.closed.lock().unwrap() = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.shutdown()
    }

    fn local_port(&self) -> Result<u16> {
        Ok(0)
    }

    fn local_ip(&self) -> Result<IpAddress> {
        Ok(IpAddress::default())
    }

    fn is_closed(&self) -> bool {
        *self.read_side.closed.lock().unwrap()
    }
}

impl ByteReader for MemoryTransport {
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
        let mut total = 0;
        while total < buf.len() {
            let n = Transport::read(self, &mut buf[total..], Timeout::WAIT_FOREVER)?;
            total += n;
        }
        Ok(())
    }
}

impl ByteWriter for MemoryTransport {
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
        Transport::write(self, buf, Timeout::WAIT_FOREVER)?;
        Ok(())
    }
}
