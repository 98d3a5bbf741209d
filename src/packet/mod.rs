//! Framed wire packet: fixed header, variable headers, an encoded property
//! map, and an opaque body (§4.6).

mod flags;
mod variable_header;

pub use flags::PacketFlags;
pub use variable_header::{VariableHeaderId, VariableHeaderValue};

use crate::codec::encoding_b;
use crate::error::{Error, Result};
use crate::io::{BufWriter, ByteReader, ByteWriter, SliceReader};
use crate::net::sys_message_id::SysMessageId;
use crate::property_map::PropertyMap;

pub const MAGIC: u32 = 0x4A4D_5150; // "JMQP"
pub const VERSION: u16 = 1;
pub const HEADER_SIZE: u32 = 72;

fn now_millis() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// One framed unit of the wire protocol: a fixed header, an ordered list
/// of variable headers, an encoded property map, and an opaque body.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub packet_type: u16,
    pub expiration: u64,
    pub sys_message_id: SysMessageId,
    pub priority: u8,
    pub encryption: u8,
    pub flags: PacketFlags,
    pub consumer_id: u64,
    pub variable_headers: Vec<(VariableHeaderId, VariableHeaderValue)>,
    pub properties: PropertyMap,
    pub body: Vec<u8>,
}

impl Packet {
    pub fn new(packet_type: u16, sys_message_id: SysMessageId) -> Self {
        Self {
            packet_type,
            expiration: 0,
            sys_message_id,
            priority: 4,
            encryption: 0,
            flags: PacketFlags::default(),
            consumer_id: 0,
            variable_headers: Vec::new(),
            properties: PropertyMap::new(),
            body: Vec::new(),
        }
    }

    /// Serializes this packet, stamping it with a fresh sequence number
    /// and the current timestamp first (§4.6 write state machine) — every
    /// call produces a distinct `SysMessageId`, even for the same packet
    /// written twice.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut scratch = BufWriter::new();
        variable_header::write_all(&mut scratch, &self.variable_headers)?;
        let variable_headers_bytes = scratch.into_bytes();

        let properties_bytes = encoding_b::encode(&self.properties)?;

        self.sys_message_id.sequence = crate::net::sys_message_id::next_sequence();
        self.sys_message_id.timestamp = now_millis();

        let properties_offset = HEADER_SIZE + variable_headers_bytes.len() as u32;
        let properties_size = properties_bytes.len() as u32;
        let packet_size = properties_offset + properties_size + self.body.len() as u32;

        let mut w = BufWriter::new();
        w.write_u32(MAGIC)?;
        w.write_u16(VERSION)?;
        w.write_u16(self.packet_type)?;
        w.write_u32(packet_size)?;
        w.write_u64(self.expiration)?;
        self.sys_message_id.write(&mut w)?;
        w.write_u32(properties_offset)?;
        w.write_u32(properties_size)?;
        w.write_u8(self.priority)?;
        w.write_u8(self.encryption)?;
        w.write_u16(self.flags.bits())?;
        w.write_u64(self.consumer_id)?;

        debug_assert_eq!(w.num_bytes_written() as u32, HEADER_SIZE);

        w.write_bytes(&variable_headers_bytes)?;
        w.write_bytes(&properties_bytes)?;
        w.write_bytes(&self.body)?;

        Ok(w.into_bytes().to_vec())
    }

    /// Parses one packet from a blocking or in-memory byte source,
    /// following the §4.6 read state machine: fixed header first, then
    /// the rest of the packet in one read, sliced into variable headers,
    /// properties, and body by the header's own offset/size fields.
    pub fn read_from(r: &mut impl ByteReader) -> Result<Self> {
        let magic = r.read_u32()?;
        if magic != MAGIC {
            return Err(Error::BadMagic);
        }
        let version = r.read_u16()?;
        if version != VERSION {
            return Err(Error::UnsupportedVersion);
        }
        let packet_type = r.read_u16()?;
        let packet_size = r.read_u32()?;
        if packet_size < HEADER_SIZE {
            return Err(Error::InvalidPacket);
        }
        let expiration = r.read_u64()?;
        let sys_message_id = SysMessageId::read(r)?;
        let properties_offset = r.read_u32()?;
        let properties_size = r.read_u32()?;
        let properties_end = properties_offset.checked_add(properties_size).ok_or(Error::InvalidPacketField)?;
        if properties_offset < HEADER_SIZE || properties_end > packet_size {
            return Err(Error::InvalidPacketField);
        }
        let priority = r.read_u8()?;
        let encryption = r.read_u8()?;
        let flags = PacketFlags::from_bits(r.read_u16()?);
        let consumer_id = r.read_u64()?;

        let rest = r.read_vec((packet_size - HEADER_SIZE) as usize)?;

        let variable_headers_len = (properties_offset - HEADER_SIZE) as usize;
        let properties_start = variable_headers_len;
        let properties_len = properties_size as usize;

        let variable_headers = if variable_headers_len > 0 {
            let mut vr = SliceReader::new(&rest[..variable_headers_len]);
            variable_header::read_all(&mut vr)?
        } else {
            Vec::new()
        };

        let properties =
            if properties_len > 0 { encoding_b::decode(&rest[properties_start..properties_start + properties_len])? } else { PropertyMap::new() };

        let body = rest[properties_start + properties_len..].to_vec();

        Ok(Self {
            packet_type,
            expiration,
            sys_message_id,
            priority,
            encryption,
            flags,
            consumer_id,
            variable_headers,
            properties,
            body,
        })
    }

    fn variable_header_str(&self, id: VariableHeaderId) -> Option<&str> {
        self.variable_headers.iter().find(|(h, _)| *h == id).and_then(|(_, v)| match v {
            VariableHeaderValue::Str(s) => Some(s.as_str()),
            _ => None,
        })
    }

    fn variable_header_u64(&self, id: VariableHeaderId) -> u64 {
        self.variable_headers
            .iter()
            .find(|(h, _)| *h == id)
            .and_then(|(_, v)| if let VariableHeaderValue::U64(n) = v { Some(*n) } else { None })
            .unwrap_or(0)
    }

    fn set_variable_header(&mut self, id: VariableHeaderId, value: VariableHeaderValue) {
        if let Some(entry) = self.variable_headers.iter_mut().find(|(h, _)| *h == id) {
            entry.1 = value;
        } else {
            self.variable_headers.push((id, value));
        }
    }

    /// Exposes the named header fields as a [`PropertyMap`], the way the
    /// source bridges packet header fields into properties for callers
    /// that want a single uniform accessor surface.
    pub fn get_headers(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.set_bool_property("Persistent", self.flags.is_persistent());
        props.set_bool_property("Redelivered", self.flags.is_redelivered());
        props.set_i64_property("Expiration", self.expiration as i64);
        props.set_i64_property("DeliveryTime", self.variable_header_u64(VariableHeaderId::DeliveryTime) as i64);
        props.set_i32_property("Priority", self.priority as i32);
        props.set_i64_property("Timestamp", self.sys_message_id.timestamp as i64);
        props.set_string_property("MessageType", self.variable_header_str(VariableHeaderId::MessageType).unwrap_or_default());
        props.set_string_property("MessageID", self.variable_header_str(VariableHeaderId::MessageID).unwrap_or_default());
        props.set_string_property("CorrelationID", self.variable_header_str(VariableHeaderId::CorrelationID).unwrap_or_default());
        props
    }

    /// Applies the named header fields from `props` onto this packet's
    /// real fields. A type mismatch on any individual field is recorded
    /// but does not stop the remaining fields from being applied (§4.6).
    pub fn set_headers(&mut self, props: &PropertyMap) -> Result<()> {
        let mut first_err = None;

        if let Ok(v) = props.get("Persistent") {
            match v.as_bool() {
                Ok(b) => self.flags.set_persistent(b),
                Err(_) => {
                    first_err.get_or_insert(Error::PropertyWrongValueType);
                }
            }
        }
        if let Ok(v) = props.get("Redelivered") {
            match v.as_bool() {
                Ok(b) => self.flags.set_redelivered(b),
                Err(_) => {
                    first_err.get_or_insert(Error::PropertyWrongValueType);
                }
            }
        }
        if let Ok(v) = props.get("Expiration") {
            match v.as_i64() {
                Ok(n) => self.expiration = n as u64,
                Err(_) => {
                    first_err.get_or_insert(Error::PropertyWrongValueType);
                }
            }
        }
        if let Ok(v) = props.get("DeliveryTime") {
            match v.as_i64() {
                Ok(n) => self.set_variable_header(VariableHeaderId::DeliveryTime, VariableHeaderValue::U64(n as u64)),
                Err(_) => {
                    first_err.get_or_insert(Error::PropertyWrongValueType);
                }
            }
        }
        if let Ok(v) = props.get("Priority") {
            match v.as_i32() {
                Ok(n) => self.priority = n as u8,
                Err(_) => {
                    first_err.get_or_insert(Error::PropertyWrongValueType);
                }
            }
        }
        if let Ok(v) = props.get("Timestamp") {
            match v.as_i64() {
                Ok(n) => self.sys_message_id.timestamp = n as u64,
                Err(_) => {
                    first_err.get_or_insert(Error::PropertyWrongValueType);
                }
            }
        }
        if let Ok(v) = props.get("MessageType") {
            self.set_variable_header(VariableHeaderId::MessageType, VariableHeaderValue::Str(v.as_string()));
        }
        if let Ok(v) = props.get("MessageID") {
            self.set_variable_header(VariableHeaderId::MessageID, VariableHeaderValue::Str(v.as_string()));
        }
        if let Ok(v) = props.get("CorrelationID") {
            self.set_variable_header(VariableHeaderId::CorrelationID, VariableHeaderValue::Str(v.as_string()));
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
