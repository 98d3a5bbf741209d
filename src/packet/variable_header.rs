//! Variable headers: an id-keyed list of records between the fixed
//! header and the property-map region, terminated by an id-0 record and
//! padded to a 4-byte boundary (§4.6).

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{Error, Result};
use crate::io::{BufWriter, ByteReader, ByteWriter, SliceReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum VariableHeaderId {
    HeaderTerminator = 0,
    MessageID = 1,
    CorrelationID = 2,
    ReplyTo = 3,
    ReplyToClass = 4,
    MessageType = 5,
    Destination = 6,
    DestinationClass = 7,
    TransactionID = 8,
    ProducerID = 9,
    DeliveryTime = 10,
    DeliveryCount = 11,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariableHeaderValue {
    Str(String),
    U64(u64),
    U32(u32),
}

fn write_one(w: &mut BufWriter, id: VariableHeaderId, value: &VariableHeaderValue) -> Result<()> {
    w.write_u16(id.into())?;
    match value {
        VariableHeaderValue::Str(s) => {
            let bytes = s.as_bytes();
            w.write_u16(bytes.len() as u16)?;
            w.write_bytes(bytes)
        }
        VariableHeaderValue::U64(n) => {
            w.write_u16(8)?;
            w.write_u64(*n)
        }
        VariableHeaderValue::U32(n) => {
            w.write_u16(4)?;
            w.write_u32(*n)
        }
    }
}

/// Writes every record, the terminator, and zero padding out to the next
/// 4-byte boundary.
pub fn write_all(w: &mut BufWriter, headers: &[(VariableHeaderId, VariableHeaderValue)]) -> Result<()> {
    for (id, value) in headers {
        write_one(w, *id, value)?;
    }

    w.write_u16(VariableHeaderId::HeaderTerminator.into())?;
    w.write_u16(0)?;

    let padding = (4 - (w.num_bytes_written() % 4)) % 4;
    for _ in 0..padding {
        w.write_u8(0)?;
    }

    Ok(())
}

fn expects_string(id: VariableHeaderId) -> bool {
    matches!(
        id,
        VariableHeaderId::MessageID
            | VariableHeaderId::CorrelationID
            | VariableHeaderId::ReplyTo
            | VariableHeaderId::ReplyToClass
            | VariableHeaderId::MessageType
            | VariableHeaderId::Destination
            | VariableHeaderId::DestinationClass
    )
}

/// Reads records up to (and including) the terminator, or until the
/// slice is exhausted. Unknown ids are consumed and ignored (§4.6).
pub fn read_all(r: &mut SliceReader) -> Result<Vec<(VariableHeaderId, VariableHeaderValue)>> {
    let mut out = Vec::new();

    loop {
        if r.remaining() < 4 {
            break;
        }

        let raw_id = r.read_u16()?;
        let len = r.read_u16()? as usize;

        if raw_id == VariableHeaderId::HeaderTerminator.into() {
            let _ = r.read_vec(len)?;
            break;
        }

        let id = match VariableHeaderId::try_from(raw_id) {
            Ok(id) => id,
            Err(_) => {
                r.read_vec(len)?;
                continue;
            }
        };

        let value = if expects_string(id) {
            let bytes = r.read_vec(len)?;
            VariableHeaderValue::Str(String::from_utf8(bytes)?)
        } else {
            match id {
                VariableHeaderId::TransactionID | VariableHeaderId::ProducerID | VariableHeaderId::DeliveryTime => {
                    if len != 8 {
                        return Err(Error::InvalidPacketField);
                    }
                    VariableHeaderValue::U64(r.read_u64()?)
                }
                VariableHeaderId::DeliveryCount => {
                    if len != 4 {
                        return Err(Error::InvalidPacketField);
                    }
                    VariableHeaderValue::U32(r.read_u32()?)
                }
                VariableHeaderId::HeaderTerminator => unreachable!("handled above"),
                _ => unreachable!("covered by expects_string"),
            }
        };

        out.push((id, value));
    }

    Ok(out)
}
