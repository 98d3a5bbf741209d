//! Encoding B — the legacy property-map format, bit-compatible with Java
//! object serialization of a `java.util.Hashtable<String, Object>` whose
//! values are boxed `Boolean`/`Byte`/`Short`/`Integer`/`Long`/`Float`/
//! `Double`/`String` instances.
//!
//! The byte-level grammar (magic, stream version, `TC_*` tags, per-class
//! `serialVersionUID`s, and the canned class-descriptor byte strings) comes
//! from the Java Object Serialization Specification's terminal symbols, as
//! captured by the values below. A handle table assigns each class
//! description and each distinct value a back-reference handle the way the
//! Java stream format does, starting at handle `0x007E_0000`.

use crate::error::{Error, Result};
use crate::io::{BufWriter, ByteReader, ByteWriter, SliceReader};
use crate::property_map::PropertyMap;
use crate::value::TypedValue;

const STREAM_MAGIC: u16 = 0xACED;
const STREAM_VERSION: u16 = 5;

const TC_NULL: u8 = 0x70;
const TC_REFERENCE: u8 = 0x71;
const TC_CLASSDESC: u8 = 0x72;
const TC_OBJECT: u8 = 0x73;
const TC_STRING: u8 = 0x74;
const TC_CLASS: u8 = 0x76;
const TC_BLOCKDATA: u8 = 0x77;
const TC_ENDBLOCKDATA: u8 = 0x78;
const TC_LONGSTRING: u8 = 0x7C;

const BASE_HANDLE: u32 = 0x007E_0000;

/// Bytes that begin every serialized hashtable: magic, version, `TC_OBJECT`,
/// the full `java.util.Hashtable` class descriptor (name, serialVersionUID,
/// the `loadFactor`/`threshold` field descriptors), `TC_ENDBLOCKDATA`, and
/// the `TC_NULL` that marks Hashtable as having no serializable superclass.
const HASHTABLE_PREFIX: &[u8] = &[
    0xAC, 0xED, 0x00, 0x05, 0x73, 0x72, 0x00, 0x13, 0x6A, 0x61, 0x76, 0x61, 0x2E, 0x75, 0x74, 0x69,
    0x6C, 0x2E, 0x48, 0x61, 0x73, 0x68, 0x74, 0x61, 0x62, 0x6C, 0x65, 0x13, 0xBB, 0x0F, 0x25, 0x21,
    0x4A, 0xE4, 0xB8, 0x03, 0x00, 0x02, 0x46, 0x00, 0x0A, 0x6C, 0x6F, 0x61, 0x64, 0x46, 0x61, 0x63,
    0x74, 0x6F, 0x72, 0x49, 0x00, 0x09, 0x74, 0x68, 0x72, 0x65, 0x73, 0x68, 0x6F, 0x6C, 0x64, 0x78,
    0x70,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SerialType {
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    Number,
    Hashtable,
}

impl SerialType {
    fn of_scalar(value: &TypedValue) -> Option<Self> {
        match value {
            TypedValue::Bool(_) => Some(Self::Boolean),
            TypedValue::I8(_) => Some(Self::Byte),
            TypedValue::I16(_) => Some(Self::Short),
            TypedValue::I32(_) => Some(Self::Integer),
            TypedValue::I64(_) => Some(Self::Long),
            TypedValue::F32(_) => Some(Self::Float),
            TypedValue::F64(_) => Some(Self::Double),
            TypedValue::Str(_) => None,
        }
    }

    fn superclass(self) -> Option<Self> {
        match self {
            Self::Boolean => None,
            Self::Byte | Self::Short | Self::Integer | Self::Long | Self::Float | Self::Double => {
                Some(Self::Number)
            }
            Self::Number => None,
            Self::Hashtable => None,
        }
    }

    /// `00 <namelen> <name bytes> <8-byte serialVersionUID> <field descriptors..> TC_ENDBLOCKDATA`,
    /// i.e. everything `writeClassDesc` writes for this class except the
    /// trailing superclass descriptor.
    fn full_class_desc(self) -> &'static [u8] {
        match self {
            Self::Boolean => &[
                0x00, 0x11, 0x6A, 0x61, 0x76, 0x61, 0x2E, 0x6C, 0x61, 0x6E, 0x67, 0x2E, 0x42, 0x6F,
                0x6F, 0x6C, 0x65, 0x61, 0x6E, 0xCD, 0x20, 0x72, 0x80, 0xD5, 0x9C, 0xFA, 0xEE, 0x02,
                0x00, 0x01, 0x5A, 0x00, 0x05, 0x76, 0x61, 0x6C, 0x75, 0x65, 0x78,
            ],
            Self::Byte => &[
                0x00, 0x0E, 0x6A, 0x61, 0x76, 0x61, 0x2E, 0x6C, 0x61, 0x6E, 0x67, 0x2E, 0x42, 0x79,
                0x74, 0x65, 0x9C, 0x4E, 0x60, 0x84, 0xEE, 0x50, 0xF5, 0x1C, 0x02, 0x00, 0x01, 0x42,
                0x00, 0x05, 0x76, 0x61, 0x6C, 0x75, 0x65, 0x78,
            ],
            Self::Short => &[
                0x00, 0x0F, 0x6A, 0x61, 0x76, 0x61, 0x2E, 0x6C, 0x61, 0x6E, 0x67, 0x2E, 0x53, 0x68,
                0x6F, 0x72, 0x74, 0x68, 0x4D, 0x37, 0x13, 0x34, 0x60, 0xDA, 0x52, 0x02, 0x00, 0x01,
                0x53, 0x00, 0x05, 0x76, 0x61, 0x6C, 0x75, 0x65, 0x78,
            ],
            Self::Integer => &[
                0x00, 0x11, 0x6A, 0x61, 0x76, 0x61, 0x2E, 0x6C, 0x61, 0x6E, 0x67, 0x2E, 0x49, 0x6E,
                0x74, 0x65, 0x67, 0x65, 0x72, 0x12, 0xE2, 0xA0, 0xA4, 0xF7, 0x81, 0x87, 0x38, 0x02,
                0x00, 0x01, 0x49, 0x00, 0x05, 0x76, 0x61, 0x6C, 0x75, 0x65, 0x78,
            ],
            Self::Long => &[
                0x00, 0x0E, 0x6A, 0x61, 0x76, 0x61, 0x2E, 0x6C, 0x61, 0x6E, 0x67, 0x2E, 0x4C, 0x6F,
                0x6E, 0x67, 0x3B, 0x8B, 0xE4, 0x90, 0xCC, 0x8F, 0x23, 0xDF, 0x02, 0x00, 0x01, 0x4A,
                0x00, 0x05, 0x76, 0x61, 0x6C, 0x75, 0x65, 0x78,
            ],
            Self::Float => &[
                0x00, 0x0F, 0x6A, 0x61, 0x76, 0x61, 0x2E, 0x6C, 0x61, 0x6E, 0x67, 0x2E, 0x46, 0x6C,
                0x6F, 0x61, 0x74, 0xDA, 0xED, 0xC9, 0xA2, 0xDB, 0x3C, 0xF0, 0xEC, 0x02, 0x00, 0x01,
                0x46, 0x00, 0x05, 0x76, 0x61, 0x6C, 0x75, 0x65, 0x78,
            ],
            Self::Double => &[
                0x00, 0x10, 0x6A, 0x61, 0x76, 0x61, 0x2E, 0x6C, 0x61, 0x6E, 0x67, 0x2E, 0x44, 0x6F,
                0x75, 0x62, 0x6C, 0x65, 0x80, 0xB3, 0xC2, 0x4A, 0x29, 0x6B, 0xFB, 0x04, 0x02, 0x00,
                0x01, 0x44, 0x00, 0x05, 0x76, 0x61, 0x6C, 0x75, 0x65, 0x78,
            ],
            Self::Number => &[
                0x00, 0x10, 0x6A, 0x61, 0x76, 0x61, 0x2E, 0x6C, 0x61, 0x6E, 0x67, 0x2E, 0x4E, 0x75,
                0x6D, 0x62, 0x65, 0x72, 0x86, 0xAC, 0x95, 0x1D, 0x0B, 0x94, 0xE0, 0x8B, 0x02, 0x00,
                0x00, 0x78,
            ],
            Self::Hashtable => &[],
        }
    }

    fn all_scalar() -> &'static [Self] {
        &[
            Self::Boolean,
            Self::Byte,
            Self::Short,
            Self::Integer,
            Self::Long,
            Self::Float,
            Self::Double,
            Self::Number,
        ]
    }
}

enum HandleEntry {
    Class(SerialType),
    Object(Option<TypedValue>),
}

#[derive(Default)]
struct HandleTable {
    entries: Vec<HandleEntry>,
}

impl HandleTable {
    fn push(&mut self, entry: HandleEntry) -> u32 {
        let handle = BASE_HANDLE + self.entries.len() as u32;
        self.entries.push(entry);
        handle
    }

    fn find_class(&self, ty: SerialType) -> Option<u32> {
        self.entries.iter().position(|e| matches!(e, HandleEntry::Class(t) if *t == ty)).map(|i| BASE_HANDLE + i as u32)
    }

    fn find_object(&self, value: &TypedValue) -> Option<u32> {
        self.entries
            .iter()
            .position(|e| matches!(e, HandleEntry::Object(Some(v)) if v == value))
            .map(|i| BASE_HANDLE + i as u32)
    }

    fn class_at(&self, handle: u32) -> Result<SerialType> {
        match self.at(handle)? {
            HandleEntry::Class(ty) => Ok(*ty),
            HandleEntry::Object(_) => Err(Error::SerializeBadHandle),
        }
    }

    fn object_at(&self, handle: u32) -> Result<TypedValue> {
        match self.at(handle)? {
            HandleEntry::Object(Some(v)) => Ok(v.clone()),
            _ => Err(Error::SerializeBadHandle),
        }
    }

    fn at(&self, handle: u32) -> Result<&HandleEntry> {
        let index = handle.checked_sub(BASE_HANDLE).ok_or(Error::SerializeBadHandle)? as usize;
        self.entries.get(index).ok_or(Error::SerializeBadHandle)
    }
}

fn write_string_value(w: &mut BufWriter, s: &str, long: bool) -> Result<()> {
    let bytes = s.as_bytes();
    if long {
        w.write_u64(bytes.len() as u64)?;
    } else {
        if bytes.len() > u16::MAX as usize {
            return Err(Error::SerializeStringTooBig);
        }
        w.write_u16(bytes.len() as u16)?;
    }
    w.write_bytes(bytes)
}

fn write_class_desc(w: &mut BufWriter, handles: &mut HandleTable, ty: SerialType) -> Result<()> {
    if let Some(handle) = handles.find_class(ty) {
        w.write_u8(TC_REFERENCE)?;
        return w.write_u32(handle);
    }

    handles.push(HandleEntry::Class(ty));
    w.write_u8(TC_CLASSDESC)?;
    w.write_bytes(ty.full_class_desc())?;

    match ty.superclass() {
        Some(super_ty) => write_class_desc(w, handles, super_ty),
        None => w.write_u8(TC_NULL),
    }
}

fn write_new_object(w: &mut BufWriter, handles: &mut HandleTable, value: &TypedValue) -> Result<()> {
    match value {
        TypedValue::Str(form) => {
            let long = matches!(form, crate::value::StrForm::Long(_));
            w.write_u8(if long { TC_LONGSTRING } else { TC_STRING })?;
            handles.push(HandleEntry::Object(Some(value.clone())));
            write_string_value(w, form.as_str(), long)
        }
        _ => {
            let ty = SerialType::of_scalar(value).expect("non-string TypedValue always maps to a SerialType");
            w.write_u8(TC_OBJECT)?;
            write_class_desc(w, handles, ty)?;
            handles.push(HandleEntry::Object(Some(value.clone())));
            write_scalar_payload(w, value)
        }
    }
}

fn write_scalar_payload(w: &mut BufWriter, value: &TypedValue) -> Result<()> {
    match value {
        TypedValue::Bool(v) => w.write_bool(*v),
        TypedValue::I8(v) => w.write_i8(*v),
        TypedValue::I16(v) => w.write_i16(*v),
        TypedValue::I32(v) => w.write_i32(*v),
        TypedValue::I64(v) => w.write_i64(*v),
        TypedValue::F32(v) => w.write_f32(*v),
        TypedValue::F64(v) => w.write_f64(*v),
        TypedValue::Str(_) => unreachable!("strings are written by write_new_object directly"),
    }
}

fn write_object(w: &mut BufWriter, handles: &mut HandleTable, value: &TypedValue) -> Result<()> {
    if let Some(handle) = handles.find_object(value) {
        w.write_u8(TC_REFERENCE)?;
        return w.write_u32(handle);
    }

    write_new_object(w, handles, value)
}

pub fn encode(map: &PropertyMap) -> Result<Vec<u8>> {
    let mut w = BufWriter::new();
    w.write_bytes(HASHTABLE_PREFIX)?;

    let mut handles = HandleTable::default();
    handles.push(HandleEntry::Class(SerialType::Hashtable));
    handles.push(HandleEntry::Object(None));

    let num_keys = map.num_keys() as i32;
    w.write_f32(1.0)?; // loadFactor, always reported as 1.0 by the backing map
    w.write_i32(num_keys)?; // threshold == numKeys for this map's getThreshold()

    w.write_u8(TC_BLOCKDATA)?;
    w.write_u8(0x08)?; // 4 + 4 bytes of capacity/numKeys follow
    w.write_i32(num_keys)?; // capacity == numKeys for this map's getCapacity()
    w.write_i32(num_keys)?;

    for (key, value) in map.iter() {
        write_object(&mut w, &mut handles, &TypedValue::str_auto(key))?;
        write_object(&mut w, &mut handles, value)?;
    }

    w.write_u8(TC_ENDBLOCKDATA)?;

    Ok(w.into_bytes().to_vec())
}

fn read_string_value(r: &mut SliceReader, long: bool) -> Result<String> {
    let len = if long { r.read_u64()? as usize } else { r.read_u16()? as usize };
    let bytes = r.read_vec(len)?;
    if !long && bytes.contains(&0) {
        return Err(Error::SerializeStringContainsNull);
    }
    String::from_utf8(bytes).map_err(|e| Error::from(e.utf8_error()))
}

fn read_class_desc(r: &mut SliceReader, handles: &mut HandleTable) -> Result<Option<SerialType>> {
    let tag = r.read_u8()?;
    match tag {
        TC_NULL => Ok(None),
        TC_REFERENCE => {
            let handle = r.read_u32()?;
            handles.class_at(handle).map(Some)
        }
        TC_CLASSDESC => {
            let ty = SerialType::all_scalar()
                .iter()
                .copied()
                .find(|ty| r.peek_remaining().starts_with(ty.full_class_desc()))
                .ok_or(Error::SerializeUnrecognizedClass)?;

            let consumed = ty.full_class_desc().len();
            r.read_vec(consumed)?;
            handles.push(HandleEntry::Class(ty));

            let expected_super = ty.superclass();
            let actual_super = read_class_desc(r, handles)?;
            if actual_super != expected_super {
                return Err(Error::SerializeBadSuperClass);
            }

            Ok(Some(ty))
        }
        _ => Err(Error::SerializeUnexpectedBytes),
    }
}

fn read_object(r: &mut SliceReader, handles: &mut HandleTable) -> Result<TypedValue> {
    let tag = r.read_u8()?;
    match tag {
        TC_REFERENCE => {
            let handle = r.read_u32()?;
            handles.object_at(handle)
        }
        TC_STRING | TC_LONGSTRING => {
            let long = tag == TC_LONGSTRING;
            let s = read_string_value(r, long)?;
            let value = if long { TypedValue::long_str(s) } else { TypedValue::short_str(s) };
            handles.push(HandleEntry::Object(Some(value.clone())));
            Ok(value)
        }
        TC_OBJECT => {
            let ty = read_class_desc(r, handles)?.ok_or(Error::SerializeUnrecognizedClass)?;
            let value = match ty {
                SerialType::Boolean => TypedValue::Bool(r.read_bool()?),
                SerialType::Byte => TypedValue::I8(r.read_i8()?),
                SerialType::Short => TypedValue::I16(r.read_i16()?),
                SerialType::Integer => TypedValue::I32(r.read_i32()?),
                SerialType::Long => TypedValue::I64(r.read_i64()?),
                SerialType::Float => TypedValue::F32(r.read_f32()?),
                SerialType::Double => TypedValue::F64(r.read_f64()?),
                SerialType::Number | SerialType::Hashtable => return Err(Error::SerializeUnrecognizedClass),
            };
            handles.push(HandleEntry::Object(Some(value.clone())));
            Ok(value)
        }
        _ => Err(Error::SerializeUnexpectedBytes),
    }
}

pub fn decode(bytes: &[u8]) -> Result<PropertyMap> {
    if bytes.len() < 4 {
        return Err(Error::SerializeBadMagicNumber);
    }

    let mut r = SliceReader::new(bytes);
    let magic = r.read_u16()?;
    if magic != STREAM_MAGIC {
        return Err(Error::SerializeBadMagicNumber);
    }

    let version = r.read_u16()?;
    if version != STREAM_VERSION {
        return Err(Error::SerializeBadVersion);
    }

    if r.read_u8()? != TC_OBJECT {
        return Err(Error::SerializeUnexpectedBytes);
    }

    let mut handles = HandleTable::default();

    if r.read_u8()? != TC_CLASSDESC {
        return Err(Error::SerializeUnexpectedBytes);
    }
    let hashtable_name_and_fields = &HASHTABLE_PREFIX[6..HASHTABLE_PREFIX.len() - 1];
    let remaining_after_tag = r.peek_remaining();
    if !remaining_after_tag.starts_with(hashtable_name_and_fields) {
        return Err(Error::SerializeBadClassUid);
    }
    r.read_vec(hashtable_name_and_fields.len())?;
    if r.read_u8()? != TC_NULL {
        return Err(Error::SerializeBadSuperClass);
    }
    handles.push(HandleEntry::Class(SerialType::Hashtable));
    handles.push(HandleEntry::Object(None));

    let _load_factor = r.read_f32()?;
    let _threshold = r.read_i32()?;

    if r.read_u8()? != TC_BLOCKDATA {
        return Err(Error::SerializeUnexpectedBytes);
    }
    if r.read_u8()? != 0x08 {
        return Err(Error::SerializeUnexpectedBytes);
    }
    let _capacity = r.read_i32()?;
    let num_keys = r.read_i32()?;
    if num_keys < 0 {
        return Err(Error::SerializeUnexpectedBytes);
    }

    let mut map = PropertyMap::new();
    for _ in 0..num_keys {
        let key = read_object(&mut r, &mut handles)?;
        let value = read_object(&mut r, &mut handles)?;
        let key = match key {
            TypedValue::Str(form) => form.as_str().to_string(),
            _ => return Err(Error::SerializeUnrecognizedClass),
        };
        map.insert(key, value).map_err(|_| Error::SerializeUnexpectedBytes)?;
    }

    if r.read_u8()? != TC_ENDBLOCKDATA {
        return Err(Error::SerializeUnexpectedBytes);
    }

    Ok(map)
}
