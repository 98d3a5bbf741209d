//! System message identifier: timestamp, address, port, and a process-wide
//! sequence number (§4.5).

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::Result;
use crate::io::{ByteReader, ByteWriter};
use crate::net::ip_address::IpAddress;

static NEXT_SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Allocates the next sequence number for a newly constructed message id.
///
/// Wraps from `u32::MAX` back to `0` rather than panicking; a lock-free
/// compare-exchange loop stands in for the single mutex the source
/// documents protecting its static counter (§9).
pub fn next_sequence() -> u32 {
    NEXT_SEQUENCE
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| Some(current.wrapping_add(1)))
        .expect("fetch_update's closure always returns Some")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysMessageId {
    pub timestamp: u64,
    pub ip: IpAddress,
    pub port: u32,
    pub sequence: u32,
}

impl SysMessageId {
    /// Builds a fresh id: a new sequence number and the given timestamp,
    /// address, and port. Every call produces a distinct value even if
    /// called twice with the same timestamp/address/port, by design (§9):
    /// retransmitting a message does not reuse its prior id.
    pub fn generate(timestamp: u64, ip: IpAddress, port: u32) -> Self {
        Self { timestamp, ip, port, sequence: next_sequence() }
    }

    pub fn read(r: &mut impl ByteReader) -> Result<Self> {
        let timestamp = r.read_u64()?;
        let ip = IpAddress::read(r)?;
        let port = r.read_u32()?;
        let sequence = r.read_u32()?;
        Ok(Self { timestamp, ip, port, sequence })
    }

    pub fn write(&self, w: &mut impl ByteWriter) -> Result<()> {
        w.write_u64(self.timestamp)?;
        self.ip.write(w)?;
        w.write_u32(self.port)?;
        w.write_u32(self.sequence)
    }
}

impl std::fmt::Display for SysMessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ID:{}-{}-{}-{}", self.sequence, self.ip, self.port, self.timestamp)
    }
}
