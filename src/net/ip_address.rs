//! 16-byte canonical IP address with IPv4-mapped, IPv6, and vendor
//! IPv4+MAC sub-classifications (§4.5).

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::error::Result;
use crate::io::{ByteReader, ByteWriter};

const IPV4_PREFIX: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF];
const IPV4_MAC_PREFIX: [u8; 4] = [0xFF, 0, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Unknown,
    V4,
    V6,
    V4Mac,
}

fn classify(bytes: &[u8; 16]) -> Kind {
    if bytes[..12] == IPV4_PREFIX[..] {
        Kind::V4
    } else if bytes[..4] == IPV4_MAC_PREFIX[..] {
        Kind::V4Mac
    } else {
        Kind::V6
    }
}

/// A 16-byte IP address, classified as IPv4-mapped, plain IPv6, or the
/// vendor IPv4+MAC hybrid format embedded in a [`super::sys_message_id::SysMessageID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpAddress {
    bytes: [u8; 16],
    kind: Kind,
}

impl Default for IpAddress {
    /// The zero address with an unclassified type, matching the source's
    /// `reset()`: the byte pattern happens to look IPv4-mapped, but the
    /// type tag is left `Unknown` until an address is actually read in.
    fn default() -> Self {
        let mut bytes = [0u8; 16];
        bytes[10] = 0xFF;
        bytes[11] = 0xFF;
        Self { bytes, kind: Kind::Unknown }
    }
}

impl IpAddress {
    pub fn from_ipv4(addr: Ipv4Addr) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..12].copy_from_slice(&IPV4_PREFIX);
        bytes[12..].copy_from_slice(&addr.octets());
        Self { bytes, kind: Kind::V4 }
    }

    pub fn from_ipv6(addr: Ipv6Addr) -> Self {
        let bytes = addr.octets();
        Self { kind: classify(&bytes), bytes }
    }

    /// The vendor IPv4+MAC hybrid: 8 one-bits, 24 zero-bits, the 48-bit MAC,
    /// 16 one-bits, then the 32-bit IPv4 address, matching a format used
    /// only by legacy Java clients.
    pub fn from_ipv4_mac(addr: Ipv4Addr, mac: [u8; 6]) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(&IPV4_MAC_PREFIX);
        bytes[4..10].copy_from_slice(&mac);
        bytes[10] = 0xFF;
        bytes[11] = 0xFF;
        bytes[12..].copy_from_slice(&addr.octets());
        Self { bytes, kind: Kind::V4Mac }
    }

    pub fn from_socket_addr(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(a) => Self::from_ipv4(*a.ip()),
            SocketAddr::V6(a) => Self::from_ipv6(*a.ip()),
        }
    }

    pub fn is_ipv4(&self) -> bool {
        matches!(self.kind, Kind::V4 | Kind::V4Mac)
    }

    /// The embedded IPv4 octets, valid for the V4 and V4Mac sub-classes.
    pub fn ipv4_octets(&self) -> Option<[u8; 4]> {
        self.is_ipv4().then(|| self.bytes[12..16].try_into().unwrap())
    }

    pub fn read(r: &mut impl ByteReader) -> Result<Self> {
        let mut bytes = [0u8; 16];
        r.read_exact(&mut bytes)?;
        Ok(Self { kind: classify(&bytes), bytes })
    }

    pub fn write(&self, w: &mut impl ByteWriter) -> Result<()> {
        w.write_bytes(&self.bytes)
    }
}

impl std::fmt::Display for IpAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            Kind::V4 => write!(f, "{}.{}.{}.{}", self.bytes[12], self.bytes[13], self.bytes[14], self.bytes[15]),
            Kind::V4Mac => write!(
                f,
                "{}.{}.{}.{}({:x}:{:x}:{:x}:{:x}:{:x}:{:x})",
                self.bytes[12],
                self.bytes[13],
                self.bytes[14],
                self.bytes[15],
                self.bytes[4],
                self.bytes[5],
                self.bytes[6],
                self.bytes[7],
                self.bytes[8],
                self.bytes[9],
            ),
            Kind::V6 | Kind::Unknown => {
                let groups: Vec<String> = self.bytes.chunks_exact(2).map(|c| format!("{:x}", u16::from_be_bytes([c[0], c[1]]))).collect();
                write!(f, "{}", groups.join(":"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{BufWriter, SliceReader};

    #[test]
    fn loopback_formats_as_dotted_quad() {
        let addr = IpAddress::from_ipv4(Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(addr.to_string(), "127.0.0.1");
    }

    #[test]
    fn ipv4_mac_formats_with_hex_suffix() {
        let addr = IpAddress::from_ipv4_mac(Ipv4Addr::new(10, 0, 0, 5), [0x00, 0x1a, 0x2b, 0x00, 0x0f, 0xff]);
        assert_eq!(addr.to_string(), "10.0.0.5(0:1a:2b:0:f:ff)");
    }

    #[test]
    fn plain_ipv6_formats_as_hex_groups() {
        let addr = IpAddress::from_ipv6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1));
        assert_eq!(addr.to_string(), "2001:db8:0:0:0:0:0:1");
    }

    #[test]
    fn roundtrips_through_wire_bytes() {
        let addr = IpAddress::from_ipv4(Ipv4Addr::new(192, 168, 1, 1));
        let mut w = BufWriter::new();
        addr.write(&mut w).unwrap();
        let bytes = w.into_bytes();

        let mut r = SliceReader::new(&bytes);
        let decoded = IpAddress::read(&mut r).unwrap();
        assert_eq!(addr, decoded);
    }

    #[test]
    fn default_is_unknown_despite_ipv4_like_bytes() {
        let addr = IpAddress::default();
        assert_eq!(addr.kind, Kind::Unknown);
        assert!(!addr.is_ipv4());
    }
}
