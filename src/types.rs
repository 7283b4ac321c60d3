/// Shared types used across the codebase

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A stored document: a JSON object keyed by field name
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Field holding a document's identity
pub const ID_FIELD: &str = "_id";

/// Field flagging a soft-deleted document
pub const DELETED_FIELD: &str = "_deleted";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid object id: {0}")]
pub struct InvalidObjectId(pub String);

/// Opaque 12-byte document identity, rendered as 24 lowercase hex digits.
///
/// Layout follows the usual document-store convention: 4 bytes of unix
/// seconds, 5 bytes unique to the process, 3 bytes of a rolling counter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub fn new() -> Self {
        static PROCESS: OnceLock<[u8; 5]> = OnceLock::new();
        static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

        let process = PROCESS.get_or_init(|| {
            let seed = uuid::Uuid::new_v4();
            let mut out = [0u8; 5];
            out.copy_from_slice(&seed.as_bytes()[..5]);
            out
        });
        let counter = COUNTER.get_or_init(|| {
            let seed = uuid::Uuid::new_v4();
            let b = seed.as_bytes();
            AtomicU32::new(u32::from_be_bytes([0, b[0], b[1], b[2]]))
        });

        let seconds = chrono::Utc::now().timestamp() as u32;
        let count = counter.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(process);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Whether `candidate` has the shape of an identity (24 hex digits)
    pub fn is_valid(candidate: &str) -> bool {
        candidate.len() == 24 && candidate.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !Self::is_valid(s) {
            return Err(InvalidObjectId(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidObjectId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl From<ObjectId> for serde_json::Value {
    fn from(id: ObjectId) -> Self {
        serde_json::Value::String(id.to_hex())
    }
}
