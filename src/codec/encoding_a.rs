//! Encoding A — length-prefixed typed list (new format), §4.4.
//!
//! ```text
//! u32 version = 1
//! u32 count
//! repeated count times:
//!   StrShort key
//!   u16 type-tag in {1..8}
//!   value bytes per §4.1
//! ```
//!
//! String-valued properties are always written and read as the short form
//! (2-byte length prefix): the reference property reader always constructs
//! a short-form string object regardless of the value's actual length, so
//! this port preserves that behavior rather than inventing a discriminator
//! the wire format never carried (see DESIGN.md).

use crate::error::{Error, Result};
use crate::io::{BufWriter, ByteReader, ByteWriter, SliceReader};
use crate::property_map::PropertyMap;
use crate::value::{Tag, TypedValue};

const VERSION: u32 = 1;

fn write_short_string(w: &mut BufWriter, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(Error::SerializeStringTooBig);
    }
    w.write_u16(bytes.len() as u16)?;
    w.write_bytes(bytes)
}

fn read_short_string(r: &mut SliceReader) -> Result<String> {
    let len = r.read_u16()? as usize;
    let bytes = r.read_vec(len)?;
    if bytes.contains(&0) {
        return Err(Error::SerializeStringContainsNull);
    }
    String::from_utf8(bytes).map_err(|e| Error::from(e.utf8_error()))
}

pub fn encode(map: &PropertyMap) -> Result<Vec<u8>> {
    let mut w = BufWriter::new();
    w.write_u32(VERSION)?;
    w.write_u32(map.num_keys() as u32)?;

    for (key, value) in map.iter() {
        write_short_string(&mut w, key)?;
        w.write_u16(u16::from(value.tag()))?;

        match value {
            TypedValue::Bool(v) => w.write_bool(*v)?,
            TypedValue::I8(v) => w.write_i8(*v)?,
            TypedValue::I16(v) => w.write_i16(*v)?,
            TypedValue::I32(v) => w.write_i32(*v)?,
            TypedValue::I64(v) => w.write_i64(*v)?,
            TypedValue::F32(v) => w.write_f32(*v)?,
            TypedValue::F64(v) => w.write_f64(*v)?,
            TypedValue::Str(s) => write_short_string(&mut w, s.as_str())?,
        }
    }

    Ok(w.into_bytes().to_vec())
}

pub fn decode(bytes: &[u8]) -> Result<PropertyMap> {
    let mut map = PropertyMap::new();

    let result = (|| {
        let mut r = SliceReader::new(bytes);
        let version = r.read_u32()?;
        if version != VERSION {
            return Err(Error::SerializeBadVersion);
        }

        let count = r.read_u32()?;
        for _ in 0..count {
            let key = read_short_string(&mut r)?;
            let tag = Tag::try_from(r.read_u16()?).map_err(|_| Error::SerializeUnrecognizedClass)?;

            let value = match tag {
                Tag::Bool => TypedValue::Bool(r.read_bool()?),
                Tag::I8 => TypedValue::I8(r.read_i8()?),
                Tag::I16 => TypedValue::I16(r.read_i16()?),
                Tag::I32 => TypedValue::I32(r.read_i32()?),
                Tag::I64 => TypedValue::I64(r.read_i64()?),
                Tag::F32 => TypedValue::F32(r.read_f32()?),
                Tag::F64 => TypedValue::F64(r.read_f64()?),
                Tag::Str => TypedValue::short_str(read_short_string(&mut r)?),
            };

            map.insert(key, value).map_err(|_| Error::SerializeUnexpectedBytes)?;
        }

        Ok(())
    })();

    match result {
        Ok(()) => Ok(map),
        Err(err) => Err(err),
    }
}
