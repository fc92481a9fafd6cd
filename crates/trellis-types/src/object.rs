use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Content-addressed identifier for a stored node.
///
/// An `ObjectId` is the BLAKE3 hash of a node's canonical serialization.
/// Identical content always produces the same `ObjectId`, which is what makes
/// nodes deduplicatable. On the wire (and inside serialized node bodies) an
/// id is always the 64-character lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Digest length in bytes.
    pub const LEN: usize = 32;

    /// Plain BLAKE3 of `data`. Node ids go through the domain-separated
    /// hasher instead; this is for fixtures and ad hoc keys.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Wrap an already computed digest.
    pub const fn from_hash(digest: [u8; Self::LEN]) -> Self {
        Self(digest)
    }

    /// All zeros. Never the id of a stored node.
    pub const fn null() -> Self {
        Self([0; Self::LEN])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First eight hex digits, for logs.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        // Well-formed hex of the wrong size is a length error; anything
        // else is left to the decoder.
        let well_formed = s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit());
        if well_formed && s.len() != Self::LEN * 2 {
            return Err(TypeError::InvalidLength {
                expected: Self::LEN,
                actual: s.len() / 2,
            });
        }
        let mut digest = [0u8; Self::LEN];
        hex::decode_to_slice(s, &mut digest).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Ok(Self(digest))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectId").field(&self.short_hex()).finish()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}
