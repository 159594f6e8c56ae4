//! Stable name hashing.
//!
//! Parts exchange compact identifiers instead of port names, so the hash
//! must agree between independently built processes. CRC-32 (IEEE) over
//! the UTF-8 bytes is used; it depends on nothing but the input string.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier reserved for "this envelope did not come from an output port".
pub const NO_OUTPUT_NAME: &str = "SYSTEM_NO_OUTPUT";

/// Hash of a port name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameHash(pub u32);

impl NameHash {
    /// Hash of [`NO_OUTPUT_NAME`], used on the wire for direct sends.
    pub const NO_OUTPUT: NameHash = NameHash(0x240f_ddc3);

    pub fn of(name: &str) -> Self {
        hash_name(name)
    }

    pub fn is_reserved(self) -> bool {
        self == Self::NO_OUTPUT
    }
}

impl fmt::Display for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Stable discriminant of a payload kind, derived from its declared type
/// name rather than from compiler type metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeTag(pub u32);

impl TypeTag {
    pub fn of(type_name: &str) -> Self {
        TypeTag(hash_name(type_name).0)
    }
}

impl From<NameHash> for TypeTag {
    fn from(hash: NameHash) -> Self {
        TypeTag(hash.0)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type:{:#010x}", self.0)
    }
}

/// Hash a port or type name.
pub fn hash_name(name: &str) -> NameHash {
    NameHash(crc32fast::hash(name.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_name("temp"), hash_name("temp"));
        assert_ne!(hash_name("temp"), hash_name("readTemp"));
    }

    #[test]
    fn test_known_vectors() {
        // Standard CRC-32 check value.
        assert_eq!(hash_name("123456789"), NameHash(0xcbf4_3926));
        assert_eq!(hash_name(""), NameHash(0));
    }

    #[test]
    fn test_reserved_sentinel_matches_name() {
        assert_eq!(hash_name(NO_OUTPUT_NAME), NameHash::NO_OUTPUT);
        assert!(hash_name(NO_OUTPUT_NAME).is_reserved());
        assert!(!hash_name("temp").is_reserved());
    }

    #[test]
    fn test_type_tag_from_name() {
        assert_eq!(TypeTag::of("f32"), TypeTag::from(hash_name("f32")));
        assert_eq!(TypeTag::of("f32").to_string().len(), "type:0x".len() + 8);
    }
}
