//! Tagged scalar value shared by property maps and packet headers.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{Error, Result};

/// Wire tag identifying a [`TypedValue`]'s payload kind.
///
/// The discriminants match Encoding A's type-tag field (§4.4) exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Tag {
    Bool = 1,
    I8 = 2,
    I16 = 3,
    I32 = 4,
    I64 = 5,
    F32 = 6,
    F64 = 7,
    Str = 8,
}

/// A string payload, kept short or long depending on its encoded length.
///
/// Any string of length >= 2^16 MUST be represented as `Long` on the wire;
/// the variant here simply records which form this value was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrForm {
    Short(String),
    Long(String),
}

impl StrForm {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Short(s) | Self::Long(s) => s,
        }
    }

    fn classify(s: String) -> Self {
        if s.len() >= (1 << 16) {
            Self::Long(s)
        } else {
            Self::Short(s)
        }
    }
}

#[derive(Debug, Clone)]
pub enum TypedValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(StrForm),
}

impl TypedValue {
    pub fn default_for(tag: Tag) -> Self {
        match tag {
            Tag::Bool => Self::Bool(false),
            Tag::I8 => Self::I8(0),
            Tag::I16 => Self::I16(0),
            Tag::I32 => Self::I32(0),
            Tag::I64 => Self::I64(0),
            Tag::F32 => Self::F32(0.0),
            Tag::F64 => Self::F64(0.0),
            Tag::Str => Self::short_str(String::new()),
        }
    }

    pub fn short_str(s: impl Into<String>) -> Self {
        Self::Str(StrForm::Short(s.into()))
    }

    pub fn long_str(s: impl Into<String>) -> Self {
        Self::Str(StrForm::Long(s.into()))
    }

    /// Construct a string value, picking Short/Long by length the way the
    /// encoder would, per §4.1's "length >= 2^16 MUST be StrLong" rule.
    pub fn str_auto(s: impl Into<String>) -> Self {
        Self::Str(StrForm::classify(s.into()))
    }

    pub fn tag(&self) -> Tag {
        match self {
            Self::Bool(_) => Tag::Bool,
            Self::I8(_) => Tag::I8,
            Self::I16(_) => Tag::I16,
            Self::I32(_) => Tag::I32,
            Self::I64(_) => Tag::I64,
            Self::F32(_) => Tag::F32,
            Self::F64(_) => Tag::F64,
            Self::Str(_) => Tag::Str,
        }
    }

    /// 32-bit hash. Integers hash as their low 32 bits; floats hash their
    /// raw IEEE-754 bits (64-bit values xor their high/low halves); booleans
    /// hash as 0/1; strings use a stable FNV-1a fold to 32 bits.
    ///
    /// # Test
    ///
    /// ```
    /// use mqwire_core::value::TypedValue;
    ///
    /// assert_eq!(TypedValue::Bool(true).hash(), 1);
    /// assert_eq!(TypedValue::Bool(false).hash(), 0);
    /// assert_eq!(TypedValue::I32(-1).hash(), 0xFFFF_FFFF);
    /// ```
    pub fn hash(&self) -> u32 {
        match self {
            Self::Bool(b) => *b as u32,
            Self::I8(v) => *v as u32,
            Self::I16(v) => *v as u32,
            Self::I32(v) => *v as u32,
            Self::I64(v) => (*v as u64 as u32) ^ ((*v as u64 >> 32) as u32),
            Self::F32(v) => v.to_bits(),
            Self::F64(v) => {
                let bits = v.to_bits();
                (bits as u32) ^ ((bits >> 32) as u32)
            }
            Self::Str(s) => fnv1a32(s.as_str().as_bytes()),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Str(s) => match s.as_str().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(Error::InvalidTypeConversion),
            },
            _ => Err(Error::InvalidTypeConversion),
        }
    }

    /// Only a same-width or widening integer source converts; a narrower
    /// numeric target rejects a wider numeric source outright rather than
    /// checking whether the value happens to fit (no `getInt8Value`
    /// override means `BasicType`'s default throws, regardless of value).
    pub fn as_i8(&self) -> Result<i8> {
        match self {
            Self::I8(v) => Ok(*v),
            Self::I16(_) | Self::I32(_) | Self::I64(_) => Err(Error::InvalidTypeConversion),
            Self::Str(s) => parse_and_narrow(s.as_str()),
            _ => Err(Error::InvalidTypeConversion),
        }
    }

    pub fn as_i16(&self) -> Result<i16> {
        match self {
            Self::I8(v) => Ok(*v as i16),
            Self::I16(v) => Ok(*v),
            Self::I32(_) | Self::I64(_) => Err(Error::InvalidTypeConversion),
            Self::Str(s) => parse_and_narrow(s.as_str()),
            _ => Err(Error::InvalidTypeConversion),
        }
    }

    pub fn as_i32(&self) -> Result<i32> {
        match self {
            Self::I8(v) => Ok(*v as i32),
            Self::I16(v) => Ok(*v as i32),
            Self::I32(v) => Ok(*v),
            Self::I64(_) => Err(Error::InvalidTypeConversion),
            Self::Str(s) => parse_and_narrow(s.as_str()),
            _ => Err(Error::InvalidTypeConversion),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Self::I8(v) => Ok(*v as i64),
            Self::I16(v) => Ok(*v as i64),
            Self::I32(v) => Ok(*v as i64),
            Self::I64(v) => Ok(*v),
            Self::Str(s) => s.as_str().parse::<i64>().map_err(|_| Error::StringNotNumber),
            _ => Err(Error::InvalidTypeConversion),
        }
    }

    /// `Double` -> `Float` narrows, same as the integer accessors; only
    /// the same width or a string payload converts.
    pub fn as_f32(&self) -> Result<f32> {
        match self {
            Self::F32(v) => Ok(*v),
            Self::F64(_) => Err(Error::InvalidTypeConversion),
            Self::Str(s) => s.as_str().parse::<f32>().map_err(|_| Error::StringNotNumber),
            _ => Err(Error::InvalidTypeConversion),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Self::F32(v) => Ok(*v as f64),
            Self::F64(v) => Ok(*v),
            Self::Str(s) => s.as_str().parse::<f64>().map_err(|_| Error::StringNotNumber),
            _ => Err(Error::InvalidTypeConversion),
        }
    }

    /// Borrowed text rendering. Numeric tags render with their natural
    /// `Display`; this mirrors the source's cached `toString()` without
    /// actually needing a cache, since `Display` is cheap here.
    pub fn as_string(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::I8(v) => v.to_string(),
            Self::I16(v) => v.to_string(),
            Self::I32(v) => v.to_string(),
            Self::I64(v) => v.to_string(),
            Self::F32(v) => v.to_string(),
            Self::F64(v) => v.to_string(),
            Self::Str(s) => s.as_str().to_string(),
        }
    }
}

/// Equality per §4.1: same tag and same payload. Float equality here is
/// arithmetic (`NaN != NaN`), distinct from the bitwise rule `hash()` uses.
impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::I8(a), Self::I8(b)) => a == b,
            (Self::I16(a), Self::I16(b)) => a == b,
            (Self::I32(a), Self::I32(b)) => a == b,
            (Self::I64(a), Self::I64(b)) => a == b,
            (Self::F32(a), Self::F32(b)) => a == b,
            (Self::F64(a), Self::F64(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

/// Parses a decimal string as `i64` and narrows to `T`, the two distinct
/// failure modes string-to-integer conversion can hit (§4.1).
fn parse_and_narrow<T: TryFrom<i64>>(s: &str) -> Result<T> {
    let v = s.parse::<i64>().map_err(|_| Error::StringNotNumber)?;
    T::try_from(v).map_err(|_| Error::TypeConversionOutOfBounds)
}

fn fnv1a32(bytes: &[u8]) -> u32 {
    if bytes.is_empty() {
        return 0;
    }

    let mut hash = 0x811c_9dc5u32;
    for b in bytes {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }

    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e6_i32_conversions() {
        let v = TypedValue::I32(3838);
        assert_eq!(v.as_string(), "3838");
        assert_eq!(v.as_i64().unwrap(), 3838);
        assert!(matches!(v.as_bool(), Err(Error::InvalidTypeConversion)));
    }

    #[test]
    fn e6_string_to_bool() {
        let v = TypedValue::short_str("true");
        assert!(v.as_bool().unwrap());
    }

    #[test]
    fn e6_string_out_of_bounds() {
        let v = TypedValue::short_str("99999999999");
        assert!(matches!(v.as_i16(), Err(Error::TypeConversionOutOfBounds)));
    }

    #[test]
    fn narrowing_numeric_conversions_are_rejected() {
        assert!(matches!(TypedValue::I32(3838).as_i16(), Err(Error::InvalidTypeConversion)));
        assert!(matches!(TypedValue::I64(7).as_i32(), Err(Error::InvalidTypeConversion)));
        assert!(matches!(TypedValue::I16(7).as_i8(), Err(Error::InvalidTypeConversion)));
        assert!(matches!(TypedValue::F64(1.5).as_f32(), Err(Error::InvalidTypeConversion)));
    }

    #[test]
    fn widening_numeric_conversions_succeed() {
        assert_eq!(TypedValue::I8(7).as_i16().unwrap(), 7);
        assert_eq!(TypedValue::I8(7).as_i32().unwrap(), 7);
        assert_eq!(TypedValue::I16(7).as_i32().unwrap(), 7);
        assert_eq!(TypedValue::F32(1.5).as_f64().unwrap(), 1.5);
    }

    #[test]
    fn string_to_numeric_still_uses_bounds_checking() {
        assert_eq!(TypedValue::short_str("42").as_i8().unwrap(), 42);
        assert!(matches!(TypedValue::short_str("not-a-number").as_i32(), Err(Error::StringNotNumber)));
    }

    #[test]
    fn str_auto_picks_long_at_64k() {
        let short = TypedValue::str_auto("x".repeat((1 << 16) - 1));
        assert!(matches!(short, TypedValue::Str(StrForm::Short(_))));

        let long = TypedValue::str_auto("x".repeat(1 << 16));
        assert!(matches!(long, TypedValue::Str(StrForm::Long(_))));
    }

    #[test]
    fn empty_string_hashes_zero() {
        assert_eq!(TypedValue::short_str("").hash(), 0);
    }

    #[test]
    fn equality_ignores_short_vs_long_form() {
        assert_eq!(TypedValue::short_str("hi"), TypedValue::long_str("hi"));
    }
}
