//! Property-map wire codecs (§4.4): the current length-prefixed format and
//! the legacy Java-serialization-compatible hashtable format.

pub mod encoding_a;
pub mod encoding_b;
