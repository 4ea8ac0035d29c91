//! Content fingerprinting for deduplication
//!
//! A fingerprint is a dedup key, not an integrity proof. Any collision-resistant
//! digest of fixed length works; blake3 is used for speed on large documents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex-encoded content digest, the primary key of the metadata store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Fingerprint a full byte sequence. Deterministic, no side effects.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// Synthetic origin identifier for content that arrived without one,
    /// derived from the hash so repeated sightings agree on it.
    pub fn synthetic_source_id(&self) -> String {
        format!("content:{}", &self.0[..16])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContentHash {
    fn from(hex: String) -> Self {
        Self(hex)
    }
}
